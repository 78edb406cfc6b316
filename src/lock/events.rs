//! Typed events delivered to the lock controller.
//!
//! The xAPI transport translates raw feedback notifications into these so the
//! controller never touches JSON and can be driven by synthetic events.

use super::state::LockState;
use strum::{AsRefStr, Display, EnumString};

/// `Status Standby State` values reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, AsRefStr, EnumString)]
pub enum StandbyState {
    Off,
    EnteringStandby,
    Standby,
    Halfwake,
    #[strum(default)]
    Unknown(String),
}

impl StandbyState {
    /// The auto-lock trigger this state change corresponds to, if any.
    pub fn auto_lock_trigger(&self) -> Option<AutoLockTrigger> {
        match self {
            StandbyState::EnteringStandby | StandbyState::Standby => {
                Some(AutoLockTrigger::EnteringStandby)
            }
            StandbyState::Halfwake => Some(AutoLockTrigger::EnteringHalfwake),
            StandbyState::Off | StandbyState::Unknown(_) => None,
        }
    }
}

/// Lifecycle events that can force the settings menu back to `Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AutoLockTrigger {
    #[strum(to_string = "entering standby")]
    EnteringStandby,
    #[strum(to_string = "entering halfwake")]
    EnteringHalfwake,
    #[strum(to_string = "room cleanup")]
    RoomCleanup,
}

/// Events the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A UI extension panel button was pressed.
    PanelClicked { panel_id: String },
    /// A text input prompt was submitted.
    TextInputResponse { feedback_id: String, text: String },
    /// The standby status changed.
    StandbyStateChanged(StandbyState),
    /// A room cleanup finished with the given result.
    RoomCleanupCompleted { result: String },
    /// The settings menu mode configuration changed, from any source.
    SettingsModeChanged(LockState),
    /// Countdown to standby. Logged only.
    SecondsToStandby(u64),
    /// The standby timer was reset. Logged only.
    StandbyReset,
}

impl HostEvent {
    /// Whether a room cleanup result counts as a success.
    pub fn is_successful_cleanup(result: &str) -> bool {
        result.eq_ignore_ascii_case("success")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standby_state_parse() {
        assert_eq!(
            "EnteringStandby".parse::<StandbyState>().unwrap(),
            StandbyState::EnteringStandby
        );
        assert_eq!(
            "Halfwake".parse::<StandbyState>().unwrap(),
            StandbyState::Halfwake
        );
        assert_eq!(
            "Sleeping".parse::<StandbyState>().unwrap(),
            StandbyState::Unknown("Sleeping".to_string())
        );
    }

    #[test]
    fn test_standby_trigger_mapping() {
        assert_eq!(
            StandbyState::Standby.auto_lock_trigger(),
            Some(AutoLockTrigger::EnteringStandby)
        );
        assert_eq!(
            StandbyState::EnteringStandby.auto_lock_trigger(),
            Some(AutoLockTrigger::EnteringStandby)
        );
        assert_eq!(
            StandbyState::Halfwake.auto_lock_trigger(),
            Some(AutoLockTrigger::EnteringHalfwake)
        );
        assert_eq!(StandbyState::Off.auto_lock_trigger(), None);
    }

    #[test]
    fn test_cleanup_success() {
        assert!(HostEvent::is_successful_cleanup("success"));
        assert!(HostEvent::is_successful_cleanup("Success"));
        assert!(!HostEvent::is_successful_cleanup("failure"));
    }
}
