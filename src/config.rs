use crate::lock::affordance::{ButtonConfig, ButtonSet, IconSource};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: Called at startup before any task reads the environment
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut vars = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            vars.push((key, value));
        }
    }

    vars
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub xapi: XapiConfig,
    pub lock: LockConfig,
}

/// Connection settings for the endpoint's xAPI WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XapiConfig {
    /// Host, optionally with port (e.g. `10.0.0.40` or `codec.local:443`)
    pub host: String,
    pub username: String,
    pub password: String,
    /// Use `wss://` (true) or plain `ws://` (false)
    pub secure: bool,
    /// Check the endpoint certificate against public roots. Endpoints with
    /// their factory self-signed certificate need this off.
    pub verify_tls: bool,
    pub request_timeout_secs: u64,
}

impl XapiConfig {
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}/ws", scheme, self.host)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Static settings of the lock controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub pin: String,
    /// Correlates panel clicks and prompt responses with this controller
    pub panel_id: String,
    pub buttons: ButtonSet,
    pub auto_lock: AutoLockConfig,
}

impl LockConfig {
    /// Feedback id used for the PIN prompt.
    pub fn pin_feedback_id(&self) -> String {
        format!("{}-pin", self.panel_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AutoLockConfig {
    pub entering_standby: bool,
    pub entering_halfwake: bool,
    pub upon_room_cleanup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xapi: XapiConfig {
                host: "127.0.0.1".to_string(),
                username: "admin".to_string(),
                password: String::new(),
                secure: true,
                verify_tls: true,
                request_timeout_secs: 10,
            },
            lock: LockConfig {
                pin: "1234".to_string(),
                panel_id: "settingslock".to_string(),
                buttons: ButtonSet::default(),
                auto_lock: AutoLockConfig {
                    entering_standby: true,
                    entering_halfwake: true,
                    upon_room_cleanup: true,
                },
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults overridden by `var` lookups.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // xAPI connection
        if let Some(host) = var("XAPI_HOST") {
            config.xapi.host = host;
        }
        if let Some(username) = var("XAPI_USERNAME") {
            config.xapi.username = username;
        }
        if let Some(password) = var("XAPI_PASSWORD") {
            config.xapi.password = password;
        }
        if let Some(secure) = var("XAPI_SECURE")
            && let Some(s) = parse_bool(&secure)
        {
            config.xapi.secure = s;
        }
        if let Some(verify) = var("XAPI_VERIFY_TLS")
            && let Some(v) = parse_bool(&verify)
        {
            config.xapi.verify_tls = v;
        }
        if let Some(timeout) = var("XAPI_REQUEST_TIMEOUT_SECS")
            && let Ok(t) = timeout.parse()
        {
            config.xapi.request_timeout_secs = t;
        }

        // Lock behavior
        if let Some(pin) = var("LOCK_PIN") {
            config.lock.pin = pin;
        }
        if let Some(panel_id) = var("LOCK_PANEL_ID") {
            config.lock.panel_id = panel_id;
        }
        apply_button(&var, "LOCK_BUTTON", &mut config.lock.buttons.lock);
        apply_button(&var, "UNLOCK_BUTTON", &mut config.lock.buttons.unlock);

        if let Some(v) = var("AUTO_LOCK_STANDBY")
            && let Some(b) = parse_bool(&v)
        {
            config.lock.auto_lock.entering_standby = b;
        }
        if let Some(v) = var("AUTO_LOCK_HALFWAKE")
            && let Some(b) = parse_bool(&v)
        {
            config.lock.auto_lock.entering_halfwake = b;
        }
        if let Some(v) = var("AUTO_LOCK_ROOM_CLEANUP")
            && let Some(b) = parse_bool(&v)
        {
            config.lock.auto_lock.upon_room_cleanup = b;
        }

        config
    }
}

fn apply_button(var: &impl Fn(&str) -> Option<String>, prefix: &str, button: &mut ButtonConfig) {
    if let Some(name) = var(&format!("{prefix}_NAME")) {
        button.name = name;
    }
    if let Some(icon) = var(&format!("{prefix}_ICON"))
        && let Ok(source) = icon.parse::<IconSource>()
    {
        button.icon = source;
    }
    if let Some(color) = var(&format!("{prefix}_COLOR")) {
        button.color = if color.is_empty() { None } else { Some(color) };
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(|_| None);
        assert_eq!(config.lock.pin, "1234");
        assert_eq!(config.lock.panel_id, "settingslock");
        assert_eq!(config.lock.pin_feedback_id(), "settingslock-pin");
        assert!(config.lock.auto_lock.entering_standby);
        assert!(config.lock.auto_lock.entering_halfwake);
        assert!(config.lock.auto_lock.upon_room_cleanup);
        assert_eq!(config.xapi.ws_url(), "wss://127.0.0.1/ws");
        assert!(config.xapi.verify_tls);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(lookup(&[
            ("XAPI_HOST", "10.0.0.40:8080"),
            ("XAPI_SECURE", "false"),
            ("XAPI_VERIFY_TLS", "off"),
            ("XAPI_REQUEST_TIMEOUT_SECS", "3"),
            ("LOCK_PIN", "0042"),
            ("LOCK_PANEL_ID", "roomlock"),
            ("UNLOCK_BUTTON_ICON", "Lock"),
            ("LOCK_BUTTON_COLOR", "#1170CF"),
            ("AUTO_LOCK_HALFWAKE", "no"),
        ]));
        assert_eq!(config.xapi.ws_url(), "ws://10.0.0.40:8080/ws");
        assert!(!config.xapi.verify_tls);
        assert_eq!(config.xapi.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.lock.pin, "0042");
        assert_eq!(config.lock.pin_feedback_id(), "roomlock-pin");
        assert_eq!(
            config.lock.buttons.unlock.icon,
            IconSource::Named("Lock".to_string())
        );
        assert_eq!(config.lock.buttons.lock.color.as_deref(), Some("#1170CF"));
        assert!(config.lock.auto_lock.entering_standby);
        assert!(!config.lock.auto_lock.entering_halfwake);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = Config::from_vars(lookup(&[
            ("XAPI_SECURE", "maybe"),
            ("XAPI_REQUEST_TIMEOUT_SECS", "soon"),
            ("AUTO_LOCK_STANDBY", "2"),
        ]));
        assert!(config.xapi.secure);
        assert_eq!(config.xapi.request_timeout_secs, 10);
        assert!(config.lock.auto_lock.entering_standby);
    }

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv(
            "# comment\n\nLOCK_PIN = \"9876\"\nUNLOCK_BUTTON_NAME=Unlock the Menu\nBROKEN\n",
        );
        assert_eq!(
            vars,
            vec![("LOCK_PIN", "9876"), ("UNLOCK_BUTTON_NAME", "Unlock the Menu")]
        );
    }
}
