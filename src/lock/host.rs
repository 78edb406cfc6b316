//! Host interface the lock controller depends on.
//!
//! The endpoint owns configuration storage and UI rendering. These traits are
//! the seam between the controller and whatever reaches the endpoint (the
//! xAPI client in production, an in-memory mock in tests).

use super::affordance::PanelListing;
use super::state::LockState;
use crate::error::Result;
use async_trait::async_trait;

/// Modal text input request (`UserInterface Message TextInput Display`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInputPrompt {
    pub feedback_id: String,
    pub input_type: InputType,
    pub placeholder: String,
    pub submit_text: String,
    pub text: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum InputType {
    #[strum(serialize = "PIN")]
    Pin,
}

/// Timed alert (`UserInterface Message Alert Display`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub duration_secs: u32,
    pub text: String,
    pub title: String,
}

/// Accessor for the persisted lock state.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn lock_state(&self) -> Result<LockState>;

    async fn set_lock_state(&self, state: LockState) -> Result<()>;
}

/// UI commands and queries on the endpoint.
#[async_trait]
pub trait DeviceUi: Send + Sync {
    async fn display_text_input(&self, prompt: &TextInputPrompt) -> Result<()>;

    async fn display_alert(&self, alert: &Alert) -> Result<()>;

    /// Download an icon onto the endpoint and return its icon id.
    async fn download_icon(&self, url: &str) -> Result<String>;

    /// List custom UI extension panels.
    async fn list_panels(&self) -> Result<Vec<PanelListing>>;

    async fn save_panel(&self, panel_id: &str, xml: &str) -> Result<()>;
}

/// Everything the controller needs from the endpoint.
pub trait LockHost: SettingsStore + DeviceUi {}

impl<T: SettingsStore + DeviceUi> LockHost for T {}
