//! Lock controller host interface backed by xAPI calls.

use super::client::XapiClient;
use super::feedback::SETTINGS_MENU_MODE;
use crate::error::{LockError, Result};
use crate::lock::affordance::PanelListing;
use crate::lock::host::{Alert, DeviceUi, SettingsStore, TextInputPrompt};
use crate::lock::state::LockState;
use async_trait::async_trait;
use serde_json::{Value, json};

const TEXT_INPUT_DISPLAY: &[&str] = &["UserInterface", "Message", "TextInput", "Display"];
const ALERT_DISPLAY: &[&str] = &["UserInterface", "Message", "Alert", "Display"];
const ICON_DOWNLOAD: &[&str] = &["UserInterface", "Extensions", "Icon", "Download"];
const EXTENSIONS_LIST: &[&str] = &["UserInterface", "Extensions", "List"];
const PANEL_SAVE: &[&str] = &["UserInterface", "Extensions", "Panel", "Save"];

#[async_trait]
impl SettingsStore for XapiClient {
    async fn lock_state(&self) -> Result<LockState> {
        let value = self.get(SETTINGS_MENU_MODE).await?;
        let mode = value
            .as_str()
            .ok_or_else(|| LockError::UnexpectedResponse(format!("settings menu mode: {value}")))?;
        LockState::from_config_value(mode)
    }

    async fn set_lock_state(&self, state: LockState) -> Result<()> {
        self.set(SETTINGS_MENU_MODE, json!(state.to_string())).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceUi for XapiClient {
    async fn display_text_input(&self, prompt: &TextInputPrompt) -> Result<()> {
        self.command(
            TEXT_INPUT_DISPLAY,
            json!({
                "FeedbackId": prompt.feedback_id,
                "InputType": prompt.input_type.as_ref(),
                "Placeholder": prompt.placeholder,
                "SubmitText": prompt.submit_text,
                "Text": prompt.text,
                "Title": prompt.title,
            }),
        )
        .await?;
        Ok(())
    }

    async fn display_alert(&self, alert: &Alert) -> Result<()> {
        self.command(
            ALERT_DISPLAY,
            json!({
                "Duration": alert.duration_secs,
                "Text": alert.text,
                "Title": alert.title,
            }),
        )
        .await?;
        Ok(())
    }

    async fn download_icon(&self, url: &str) -> Result<String> {
        let result = self
            .command(ICON_DOWNLOAD, json!({ "Url": url }))
            .await
            .map_err(|e| LockError::IconDownloadFailed(format!("{url}: {e}")))?;
        result
            .get("IconId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LockError::IconDownloadFailed(format!("{url}: no IconId in {result}")))
    }

    async fn list_panels(&self) -> Result<Vec<PanelListing>> {
        let result = self
            .command(EXTENSIONS_LIST, json!({ "ActivityType": "Custom" }))
            .await?;
        Ok(parse_panel_list(&result))
    }

    async fn save_panel(&self, panel_id: &str, xml: &str) -> Result<()> {
        self.command_with_body(PANEL_SAVE, json!({ "PanelId": panel_id }), xml)
            .await?;
        Ok(())
    }
}

/// Extract panels from an `Extensions List` result. A single panel may be
/// reported as an object instead of a one-element array.
pub fn parse_panel_list(result: &Value) -> Vec<PanelListing> {
    let panels = match result.get("Extensions").and_then(|e| e.get("Panel")) {
        Some(Value::Array(panels)) => panels.iter().collect::<Vec<_>>(),
        Some(panel @ Value::Object(_)) => vec![panel],
        _ => return Vec::new(),
    };

    panels
        .into_iter()
        .filter_map(|panel| {
            let panel_id = panel.get("PanelId")?.as_str()?.to_string();
            let order = panel.get("Order").and_then(|order| match order {
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                Value::String(s) => s.parse().ok(),
                _ => None,
            });
            Some(PanelListing { panel_id, order })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_panel_list() {
        let result = json!({
            "Extensions": {
                "Version": "1.11",
                "Panel": [
                    {"PanelId": "wallpaper", "Order": "1", "Name": "Wallpaper"},
                    {"PanelId": "settingslock", "Order": 2, "Name": "Lock Settings"},
                    {"Name": "no id"}
                ]
            }
        });
        assert_eq!(
            parse_panel_list(&result),
            vec![
                PanelListing {
                    panel_id: "wallpaper".to_string(),
                    order: Some(1)
                },
                PanelListing {
                    panel_id: "settingslock".to_string(),
                    order: Some(2)
                },
            ]
        );
    }

    #[test]
    fn test_parse_single_panel_object() {
        let result = json!({"Extensions": {"Panel": {"PanelId": "settingslock"}}});
        assert_eq!(
            parse_panel_list(&result),
            vec![PanelListing {
                panel_id: "settingslock".to_string(),
                order: None
            }]
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_panel_list(&json!({"Extensions": {"Version": "1.11"}})).is_empty());
        assert!(parse_panel_list(&Value::Null).is_empty());
    }
}
