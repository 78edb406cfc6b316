//! WebSocket JSON-RPC client for the endpoint's xAPI.
//!
//! One reader task and one writer task per connection. Requests are matched
//! to replies by JSON-RPC id; feedback notifications are translated into
//! [`HostEvent`]s and forwarded on a channel.

use super::feedback;
use super::rpc::{self, Incoming, RpcRequest};
use super::tls;
use crate::config::XapiConfig;
use crate::error::{LockError, Result};
use crate::lock::events::HostEvent;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the feedback event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

struct Inner {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>,
    next_id: AtomicU64,
    request_timeout: Duration,
    closed: CancellationToken,
}

/// Handle to an open xAPI connection. Cheap to clone.
#[derive(Clone)]
pub struct XapiClient {
    inner: Arc<Inner>,
}

impl XapiClient {
    /// Connect to the endpoint and start the I/O tasks.
    ///
    /// Returns the client and the receiver for subscribed feedback. The
    /// receiver closes when the connection goes away.
    pub async fn connect(config: &XapiConfig) -> Result<(Self, mpsc::Receiver<HostEvent>)> {
        let url = config.ws_url();
        info!("[xAPI] Connecting to {}", url);

        let mut request = url.as_str().into_client_request()?;
        let credentials = BASE64.encode(format!("{}:{}", config.username, config.password));
        let auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| LockError::ConnectionFailed(format!("invalid credentials: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let connector = if config.secure {
            Some(Connector::Rustls(Arc::new(tls::client_config(
                config.verify_tls,
            )?)))
        } else {
            None
        };

        let (ws_stream, _) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| LockError::ConnectionFailed(format!("{url}: {e}")))?;
        info!("[xAPI] Connected");

        let (write, read) = ws_stream.split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            outgoing,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout(),
            closed: CancellationToken::new(),
        });

        tokio::spawn(write_loop(write, outgoing_rx, inner.closed.clone()));
        tokio::spawn(read_loop(read, inner.clone(), event_tx));

        Ok((Self { inner }, event_rx))
    }

    /// Issue a JSON-RPC request and wait for its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if self.inner.closed.is_cancelled() {
            return Err(LockError::ConnectionClosed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        // The reader may have drained `pending` just before the insert
        if self.inner.closed.is_cancelled() {
            self.inner.pending.lock().remove(&id);
            return Err(LockError::ConnectionClosed);
        }

        let text = serde_json::to_string(&RpcRequest::new(id, method, params))?;
        debug!("[xAPI] Request {}: {}", id, method);
        if self.inner.outgoing.send(Message::Text(text.into())).is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(LockError::ConnectionClosed);
        }

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LockError::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(LockError::RequestTimeout(method.to_string()))
            }
        }
    }

    pub async fn get(&self, path: &[&str]) -> Result<Value> {
        self.call("xGet", json!({ "Path": path })).await
    }

    pub async fn set(&self, path: &[&str], value: Value) -> Result<Value> {
        self.call("xSet", json!({ "Path": path, "Value": value }))
            .await
    }

    /// Run `xCommand/<path>` with the given parameter object.
    pub async fn command(&self, path: &[&str], params: Value) -> Result<Value> {
        let method = format!("xCommand/{}", path.join("/"));
        self.call(&method, params).await
    }

    /// Run a multiline command; `body` is sent as the command body.
    pub async fn command_with_body(
        &self,
        path: &[&str],
        mut params: Value,
        body: &str,
    ) -> Result<Value> {
        match params.as_object_mut() {
            Some(map) => {
                map.insert("body".to_string(), Value::String(body.to_string()));
            }
            None => params = json!({ "body": body }),
        }
        self.command(path, params).await
    }

    /// Subscribe to feedback for `query`, returning the subscription id.
    pub async fn subscribe(&self, query: &[&str]) -> Result<u64> {
        info!("[xAPI] Subscribing to feedback: {}", query.join(" "));
        let result = self
            .call(
                "xFeedback/Subscribe",
                json!({ "Query": query, "NotifyCurrentValue": false }),
            )
            .await?;
        result
            .get("Id")
            .and_then(Value::as_u64)
            .ok_or_else(|| LockError::UnexpectedResponse(format!("subscribe: {result}")))
    }

    /// Subscribe to every feedback path the lock controller consumes.
    pub async fn subscribe_lock_feedback(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::with_capacity(feedback::QUERIES.len());
        for query in feedback::QUERIES {
            ids.push(self.subscribe(query).await?);
        }
        Ok(ids)
    }

    /// Close the connection. Pending requests fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.inner.closed.cancel();
    }
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            msg = outgoing.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        error!("[xAPI] WebSocket write failed: {}", e);
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let _ = write.close().await;
    closed.cancel();
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    inner: Arc<Inner>,
    events: mpsc::Sender<HostEvent>,
) {
    loop {
        let msg = tokio::select! {
            _ = inner.closed.cancelled() => break,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                let text_str: &str = &text;
                dispatch(&inner, text_str, &events);
            }
            Some(Ok(Message::Close(frame))) => {
                info!("[xAPI] Endpoint closed connection: {:?}", frame);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!("[xAPI] WebSocket error: {}", e);
                break;
            }
            None => break,
        }
    }

    inner.closed.cancel();
    let pending: Vec<_> = inner.pending.lock().drain().collect();
    for (_, tx) in pending {
        let _ = tx.send(Err(LockError::ConnectionClosed));
    }
    info!("[xAPI] Connection closed");
}

/// Never awaits: a slow event consumer must not hold up request replies.
fn dispatch(inner: &Inner, text: &str, events: &mpsc::Sender<HostEvent>) {
    match rpc::decode(text) {
        Ok(Incoming::Response { id, result }) => {
            let waiter = inner.pending.lock().remove(&id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => debug!("[xAPI] Reply for unknown request {}", id),
            }
        }
        Ok(Incoming::Feedback(params)) => {
            if let Some(event) = feedback::to_host_event(&params) {
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) => {
                        warn!("[xAPI] Feedback queue full, dropping {:?}", event)
                    }
                    Err(TrySendError::Closed(_)) => debug!("[xAPI] Feedback receiver dropped"),
                }
            }
        }
        Ok(Incoming::Other) => {}
        Err(e) => warn!("[xAPI] Unreadable frame: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::future::Future;
    use tokio::net::TcpListener;

    type ServerStream = WebSocketStream<TcpStream>;

    /// Start a one-connection WebSocket server and return a plain `ws://`
    /// config pointing at it.
    async fn serve<F, Fut>(handler: F) -> XapiConfig
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            handler(ws).await;
        });

        let mut config = Config::default().xapi;
        config.host = addr.to_string();
        config.secure = false;
        config.request_timeout_secs = 1;
        config
    }

    async fn next_request(ws: &mut ServerStream) -> Value {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let text_str: &str = &text;
                    return serde_json::from_str(text_str).unwrap();
                }
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    async fn send_json(ws: &mut ServerStream, value: Value) {
        ws.send(Message::Text(value.to_string().into())).await.unwrap();
    }

    #[tokio::test]
    async fn test_replies_are_matched_by_id() {
        let config = serve(|mut ws| async move {
            let first = next_request(&mut ws).await;
            let second = next_request(&mut ws).await;
            // Answer out of order; each reply echoes its request's method
            for request in [second, first] {
                send_json(
                    &mut ws,
                    json!({"jsonrpc": "2.0", "id": request["id"], "result": request["method"]}),
                )
                .await;
            }
            let _ = ws.next().await;
        })
        .await;

        let (client, _events) = XapiClient::connect(&config).await.unwrap();
        let (a, b) = tokio::join!(
            client.call("xGet", json!({})),
            client.call("xSet", json!({}))
        );

        assert_eq!(a.unwrap(), json!("xGet"));
        assert_eq!(b.unwrap(), json!("xSet"));
        client.close();
    }

    #[tokio::test]
    async fn test_request_times_out_without_reply() {
        let config = serve(|mut ws| async move {
            let _ = next_request(&mut ws).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        let (client, _events) = XapiClient::connect(&config).await.unwrap();
        let result = client.get(&["Status", "Standby", "State"]).await;

        assert!(matches!(result, Err(LockError::RequestTimeout(m)) if m == "xGet"));
        client.close();
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_ends_feedback() {
        let config = serve(|mut ws| async move {
            let _ = next_request(&mut ws).await;
            let _ = ws.close(None).await;
        })
        .await;

        let (client, mut events) = XapiClient::connect(&config).await.unwrap();
        let result = client.get(&["Status", "Standby", "State"]).await;

        assert!(matches!(result, Err(LockError::ConnectionClosed)));
        assert!(events.recv().await.is_none());
        // Later calls fail at once rather than waiting for the timeout
        assert!(matches!(
            client.call("xGet", json!({})).await,
            Err(LockError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_call_after_close_fails_immediately() {
        let config = serve(|mut ws| async move {
            let _ = ws.next().await;
        })
        .await;

        let (client, _events) = XapiClient::connect(&config).await.unwrap();
        client.close();

        assert!(matches!(
            client.call("xGet", json!({})).await,
            Err(LockError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_feedback_is_forwarded_as_events() {
        let config = serve(|mut ws| async move {
            send_json(
                &mut ws,
                json!({
                    "jsonrpc": "2.0",
                    "method": "xFeedback/Event",
                    "params": {"Id": 0, "Event": {"UserInterface": {"Extensions": {"Panel": {"Clicked": {"PanelId": "settingslock"}}}}}}
                }),
            )
            .await;
            let _ = ws.next().await;
        })
        .await;

        let (client, mut events) = XapiClient::connect(&config).await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(HostEvent::PanelClicked {
                panel_id: "settingslock".to_string()
            })
        );
        client.close();
    }

    #[tokio::test]
    async fn test_full_feedback_queue_does_not_block_replies() {
        let config = serve(|mut ws| async move {
            let request = next_request(&mut ws).await;
            for _ in 0..(EVENT_CHANNEL_CAPACITY + 50) {
                send_json(
                    &mut ws,
                    json!({
                        "jsonrpc": "2.0",
                        "method": "xFeedback/Event",
                        "params": {"Event": {"Standby": {"SecondsToStandby": 30}}}
                    }),
                )
                .await;
            }
            send_json(
                &mut ws,
                json!({"jsonrpc": "2.0", "id": request["id"], "result": "Locked"}),
            )
            .await;
            let _ = ws.next().await;
        })
        .await;

        // Nobody drains `events` while the request is outstanding
        let (client, events) = XapiClient::connect(&config).await.unwrap();
        let result = client.get(&["Configuration", "UserInterface", "SettingsMenu", "Mode"]).await;

        assert_eq!(result.unwrap(), json!("Locked"));
        assert_eq!(events.len(), EVENT_CHANNEL_CAPACITY);
        client.close();
    }

    #[tokio::test]
    async fn test_secure_connect_fails_without_panicking() {
        // Accepts TCP and hangs up, so the TLS handshake fails
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut config = Config::default().xapi;
        config.host = addr.to_string();
        assert!(config.secure);

        let result = XapiClient::connect(&config).await;
        assert!(matches!(result, Err(LockError::ConnectionFailed(_))));
    }
}
