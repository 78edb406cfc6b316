//! xAPI feedback subscriptions and their translation into [`HostEvent`]s.

use crate::lock::events::HostEvent;
use crate::lock::state::LockState;
use log::warn;
use serde_json::Value;

pub const PANEL_CLICKED: &[&str] = &["Event", "UserInterface", "Extensions", "Panel", "Clicked"];
pub const TEXT_INPUT_RESPONSE: &[&str] =
    &["Event", "UserInterface", "Message", "TextInput", "Response"];
pub const STANDBY_STATE: &[&str] = &["Status", "Standby", "State"];
pub const ROOM_CLEANUP_COMPLETE: &[&str] = &["Event", "RoomCleanup", "Complete"];
pub const SETTINGS_MENU_MODE: &[&str] = &["Configuration", "UserInterface", "SettingsMenu", "Mode"];
pub const SECONDS_TO_STANDBY: &[&str] = &["Event", "Standby", "SecondsToStandby"];
pub const STANDBY_RESET: &[&str] = &["Event", "Standby", "Reset"];

/// Everything the lock controller subscribes to.
pub const QUERIES: &[&[&str]] = &[
    PANEL_CLICKED,
    TEXT_INPUT_RESPONSE,
    STANDBY_STATE,
    ROOM_CLEANUP_COMPLETE,
    SETTINGS_MENU_MODE,
    SECONDS_TO_STANDBY,
    STANDBY_RESET,
];

fn lookup<'a>(params: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(params, |node, key| node.get(*key))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Translate the `params` of an `xFeedback/Event` notification.
///
/// Returns `None` for notifications that carry none of the subscribed paths.
pub fn to_host_event(params: &Value) -> Option<HostEvent> {
    if let Some(clicked) = lookup(params, PANEL_CLICKED) {
        return Some(HostEvent::PanelClicked {
            panel_id: string_field(clicked, "PanelId")?,
        });
    }

    if let Some(response) = lookup(params, TEXT_INPUT_RESPONSE) {
        return Some(HostEvent::TextInputResponse {
            feedback_id: string_field(response, "FeedbackId")?,
            text: string_field(response, "Text").unwrap_or_default(),
        });
    }

    if let Some(state) = lookup(params, STANDBY_STATE).and_then(Value::as_str) {
        return state.parse().ok().map(HostEvent::StandbyStateChanged);
    }

    if let Some(complete) = lookup(params, ROOM_CLEANUP_COMPLETE) {
        return Some(HostEvent::RoomCleanupCompleted {
            result: string_field(complete, "Result").unwrap_or_default(),
        });
    }

    if let Some(mode) = lookup(params, SETTINGS_MENU_MODE).and_then(Value::as_str) {
        return match LockState::from_config_value(mode) {
            Ok(state) => Some(HostEvent::SettingsModeChanged(state)),
            Err(e) => {
                warn!("[xAPI] Ignoring settings menu mode feedback: {}", e);
                None
            }
        };
    }

    if let Some(seconds) = lookup(params, SECONDS_TO_STANDBY) {
        let seconds = match seconds {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            Value::Object(_) => seconds.get("Seconds").and_then(|s| match s {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }),
            _ => None,
        };
        return seconds.map(HostEvent::SecondsToStandby);
    }

    if lookup(params, STANDBY_RESET).is_some() {
        return Some(HostEvent::StandbyReset);
    }

    None
}
