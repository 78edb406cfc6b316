//! Settings lock controller.
//!
//! Reacts to panel clicks, PIN prompt responses and standby/cleanup events,
//! and keeps the control panel button in step with the lock state. The lock
//! state itself is never cached: every decision re-reads it from the host.
//!
//! Locking never needs authorization. Unlocking always goes through the PIN
//! prompt.

use super::affordance::{IconSource, PanelDefinition, PanelIcon, existing_order};
use super::events::{AutoLockTrigger, HostEvent, StandbyState};
use super::host::{Alert, InputType, LockHost, TextInputPrompt};
use super::state::LockState;
use crate::config::LockConfig;
use crate::error::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;

const INVALID_PIN_TITLE: &str = "Invalid PIN";
const INVALID_PIN_TEXT: &str = "The PIN entered was invalid<br> please try again";
const INVALID_PIN_ALERT_SECS: u32 = 5;
const PIN_PROMPT_TEXT: &str = "Please Enter PIN";

/// A PIN prompt that has been shown and not yet answered.
#[derive(Debug, Clone)]
pub struct PendingPrompt {
    pub feedback_id: String,
    pub issued_at: Instant,
}

pub struct LockController<H> {
    host: H,
    config: LockConfig,
    /// Held across read-decide-write so two transitions never interleave.
    transition: AsyncMutex<()>,
    pending_prompt: Mutex<Option<PendingPrompt>>,
    /// Icon ids already downloaded onto the endpoint, by URL.
    icon_ids: Mutex<HashMap<String, String>>,
    /// Last panel XML saved, so unchanged buttons are not saved again.
    saved_panel: Mutex<Option<String>>,
}

impl<H: LockHost> LockController<H> {
    pub fn new(host: H, config: LockConfig) -> Self {
        Self {
            host,
            config,
            transition: AsyncMutex::new(()),
            pending_prompt: Mutex::new(None),
            icon_ids: Mutex::new(HashMap::new()),
            saved_panel: Mutex::new(None),
        }
    }

    /// The outstanding PIN prompt, if one was issued and not answered.
    pub fn pending_prompt(&self) -> Option<PendingPrompt> {
        self.pending_prompt.lock().clone()
    }

    /// Read the lock state from the host. Read failures propagate.
    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self.host.lock_state().await?.is_locked())
    }

    /// Render the button for the current state.
    pub async fn start(&self) -> Result<()> {
        info!("[{}] Creating settings lock button", self.config.panel_id);
        self.refresh_affordance().await
    }

    /// Consume events in delivery order until the channel closes or
    /// `shutdown` fires. Handler failures are logged, never escalated.
    pub async fn run(&self, mut events: mpsc::Receiver<HostEvent>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(&event).await {
                            warn!(
                                "[{}] Failed to handle {:?}: {}",
                                self.config.panel_id, event, e
                            );
                        }
                    }
                    None => {
                        debug!("[{}] Event channel closed", self.config.panel_id);
                        break;
                    }
                },
            }
        }
    }

    pub async fn handle_event(&self, event: &HostEvent) -> Result<()> {
        match event {
            HostEvent::PanelClicked { panel_id } => self.handle_click(panel_id).await,
            HostEvent::TextInputResponse { feedback_id, text } => {
                self.handle_text_response(feedback_id, text).await
            }
            HostEvent::StandbyStateChanged(state) => self.handle_standby(state).await,
            HostEvent::RoomCleanupCompleted { result } => self.handle_room_cleanup(result).await,
            HostEvent::SettingsModeChanged(state) => {
                info!(
                    "[{}] Settings menu mode changed to {}",
                    self.config.panel_id, state
                );
                self.refresh_affordance().await
            }
            HostEvent::SecondsToStandby(seconds) => {
                debug!("Seconds to standby: {}", seconds);
                Ok(())
            }
            HostEvent::StandbyReset => {
                debug!("Standby reset event");
                Ok(())
            }
        }
    }

    /// Panel button pressed: prompt for the PIN when locked, lock otherwise.
    pub async fn handle_click(&self, panel_id: &str) -> Result<()> {
        if panel_id != self.config.panel_id {
            return Ok(());
        }

        let _guard = self.transition.lock().await;
        if self.is_locked().await? {
            info!(
                "[{}] Clicked - settings currently locked - prompting for PIN",
                self.config.panel_id
            );
            self.prompt_for_pin().await
        } else {
            info!(
                "[{}] Clicked - settings currently unlocked - now locking settings",
                self.config.panel_id
            );
            self.write_state(LockState::Locked).await?;
            self.refresh_logged().await;
            Ok(())
        }
    }

    async fn prompt_for_pin(&self) -> Result<()> {
        let prompt = TextInputPrompt {
            feedback_id: self.config.pin_feedback_id(),
            input_type: InputType::Pin,
            placeholder: PIN_PROMPT_TEXT.to_string(),
            submit_text: "Submit".to_string(),
            text: PIN_PROMPT_TEXT.to_string(),
            title: self.config.buttons.unlock.name.clone(),
        };
        self.host.display_text_input(&prompt).await?;

        let previous = self.pending_prompt.lock().replace(PendingPrompt {
            feedback_id: prompt.feedback_id,
            issued_at: Instant::now(),
        });
        if let Some(previous) = previous {
            debug!(
                "[{}] Replaced PIN prompt issued {:?} ago",
                self.config.panel_id,
                previous.issued_at.elapsed()
            );
        }
        Ok(())
    }

    /// PIN prompt answered: unlock on an exact match, alert otherwise.
    pub async fn handle_text_response(&self, feedback_id: &str, text: &str) -> Result<()> {
        if feedback_id != self.config.pin_feedback_id() {
            return Ok(());
        }

        if self.pending_prompt.lock().take().is_none() {
            debug!(
                "[{}] PIN response without a recorded prompt",
                self.config.panel_id
            );
        }

        let _guard = self.transition.lock().await;
        if text == self.config.pin {
            info!(
                "[{}] Valid PIN entered - unlocking settings menu",
                self.config.panel_id
            );
            self.write_state(LockState::Unlocked).await?;
            self.refresh_logged().await;
            Ok(())
        } else {
            info!(
                "[{}] Invalid PIN entered - displaying invalid PIN alert",
                self.config.panel_id
            );
            self.host
                .display_alert(&Alert {
                    duration_secs: INVALID_PIN_ALERT_SECS,
                    text: INVALID_PIN_TEXT.to_string(),
                    title: INVALID_PIN_TITLE.to_string(),
                })
                .await
        }
    }

    pub async fn handle_standby(&self, state: &StandbyState) -> Result<()> {
        info!("Standby state changed to {}", state.as_ref());
        match state.auto_lock_trigger() {
            Some(trigger) => self.auto_lock(trigger).await,
            None => Ok(()),
        }
    }

    pub async fn handle_room_cleanup(&self, result: &str) -> Result<()> {
        debug!("Room cleanup result: {}", result);
        if !HostEvent::is_successful_cleanup(result) {
            return Ok(());
        }
        self.auto_lock(AutoLockTrigger::RoomCleanup).await
    }

    fn trigger_enabled(&self, trigger: AutoLockTrigger) -> bool {
        let auto_lock = &self.config.auto_lock;
        match trigger {
            AutoLockTrigger::EnteringStandby => auto_lock.entering_standby,
            AutoLockTrigger::EnteringHalfwake => auto_lock.entering_halfwake,
            AutoLockTrigger::RoomCleanup => auto_lock.upon_room_cleanup,
        }
    }

    async fn auto_lock(&self, trigger: AutoLockTrigger) -> Result<()> {
        if !self.trigger_enabled(trigger) {
            debug!(
                "[{}] Auto lock on {} disabled",
                self.config.panel_id, trigger
            );
            return Ok(());
        }

        let _guard = self.transition.lock().await;
        if self.is_locked().await? {
            debug!(
                "[{}] Settings already locked - ignoring {}",
                self.config.panel_id, trigger
            );
            return Ok(());
        }

        info!(
            "[{}] Auto locking settings on {}",
            self.config.panel_id, trigger
        );
        self.write_state(LockState::Locked).await?;
        self.refresh_logged().await;
        Ok(())
    }

    async fn write_state(&self, state: LockState) -> Result<()> {
        info!("Setting settings menu mode to: {}", state);
        self.host.set_lock_state(state).await
    }

    /// Save the button matching the current state, keeping its position
    /// among other custom panels.
    pub async fn refresh_affordance(&self) -> Result<()> {
        let state = self.host.lock_state().await?;
        let button = self.config.buttons.for_state(state);

        let order = match self.host.list_panels().await {
            Ok(panels) => existing_order(&panels, &self.config.panel_id),
            Err(e) => {
                warn!(
                    "[{}] Unable to list panels, appending: {}",
                    self.config.panel_id, e
                );
                None
            }
        };

        let icon = match &button.icon {
            IconSource::Remote(url) => PanelIcon::Custom(self.icon_id(url).await?),
            IconSource::Named(name) => PanelIcon::Named(name.clone()),
        };

        let panel = PanelDefinition {
            name: button.name.clone(),
            icon,
            color: button.color.clone(),
            order,
        };
        let xml = panel.to_xml();
        if self.saved_panel.lock().as_deref() == Some(xml.as_str()) {
            debug!(
                "[{}] '{}' button unchanged",
                self.config.panel_id, panel.name
            );
            return Ok(());
        }

        self.host.save_panel(&self.config.panel_id, &xml).await?;
        *self.saved_panel.lock() = Some(xml);

        debug!(
            "[{}] Saved '{}' button (order {:?})",
            self.config.panel_id, panel.name, panel.order
        );
        Ok(())
    }

    async fn icon_id(&self, url: &str) -> Result<String> {
        if let Some(id) = self.icon_ids.lock().get(url) {
            return Ok(id.clone());
        }
        let id = self.host.download_icon(url).await?;
        self.icon_ids.lock().insert(url.to_string(), id.clone());
        Ok(id)
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh_affordance().await {
            warn!(
                "[{}] Unable to save panel: {}",
                self.config.panel_id, e
            );
        }
    }
}
