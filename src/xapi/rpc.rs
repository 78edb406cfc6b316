//! JSON-RPC 2.0 framing for the xAPI WebSocket.

use crate::error::{LockError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name of feedback notifications pushed by the endpoint.
pub const FEEDBACK_METHOD: &str = "xFeedback/Event";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// A decoded incoming frame.
#[derive(Debug)]
pub enum Incoming {
    /// Reply to one of our requests.
    Response { id: u64, result: Result<Value> },
    /// Feedback notification; carries the notification `params`.
    Feedback(Value),
    /// Anything else (unknown notifications, replies without a usable id).
    Other,
}

pub fn decode(text: &str) -> Result<Incoming> {
    let msg: RpcMessage = serde_json::from_str(text)?;

    if let Some(method) = msg.method.as_deref() {
        if method == FEEDBACK_METHOD {
            return Ok(Incoming::Feedback(msg.params.unwrap_or(Value::Null)));
        }
        return Ok(Incoming::Other);
    }

    let Some(id) = msg.id.as_ref().and_then(parse_id) else {
        return Ok(Incoming::Other);
    };

    let result = match msg.error {
        Some(error) => Err(LockError::Rpc {
            code: error.code,
            message: error_message(&error),
        }),
        None => Ok(msg.result.unwrap_or(Value::Null)),
    };
    Ok(Incoming::Response { id, result })
}

fn parse_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// The endpoint puts the useful reason in `data` (e.g. `{"Reason": ...}`).
fn error_message(error: &RpcErrorBody) -> String {
    let detail = error.data.as_ref().and_then(|data| {
        ["Reason", "Message", "message"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_str))
    });
    match detail {
        Some(detail) => format!("{} ({})", error.message, detail),
        None => error.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = RpcRequest::new(
            7,
            "xGet",
            json!({"Path": ["Configuration", "UserInterface", "SettingsMenu", "Mode"]}),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "xGet",
                "params": {"Path": ["Configuration", "UserInterface", "SettingsMenu", "Mode"]}
            })
        );
    }

    #[test]
    fn test_decode_result() {
        match decode(r#"{"jsonrpc":"2.0","id":3,"result":"Locked"}"#).unwrap() {
            Incoming::Response { id, result } => {
                assert_eq!(id, 3);
                assert_eq!(result.unwrap(), json!("Locked"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_with_reason() {
        let text = r#"{"jsonrpc":"2.0","id":"4","error":{"code":1,"message":"Command returned an error.","data":{"Reason":"Unknown PanelId"}}}"#;
        match decode(text).unwrap() {
            Incoming::Response { id, result } => {
                assert_eq!(id, 4);
                match result {
                    Err(LockError::Rpc { code, message }) => {
                        assert_eq!(code, 1);
                        assert_eq!(message, "Command returned an error. (Unknown PanelId)");
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_feedback() {
        let text = r#"{"jsonrpc":"2.0","method":"xFeedback/Event","params":{"Id":2,"Status":{"Standby":{"State":"Halfwake"}}}}"#;
        match decode(text).unwrap() {
            Incoming::Feedback(params) => {
                assert_eq!(params["Status"]["Standby"]["State"], json!("Halfwake"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_other() {
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","method":"xSomethingElse","params":{}}"#).unwrap(),
            Incoming::Other
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","result":true}"#).unwrap(),
            Incoming::Other
        ));
        assert!(decode("not json").is_err());
    }
}
