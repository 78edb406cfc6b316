//! Settings menu lock state.
//!
//! The state lives in the endpoint's configuration
//! (`Configuration UserInterface SettingsMenu Mode`); this type only mirrors
//! the two values that configuration can hold.

use crate::error::LockError;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Settings menu mode as stored on the endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        self == LockState::Locked
    }

    /// Parse the raw configuration value read from the endpoint.
    ///
    /// Anything other than `Locked`/`Unlocked` is rejected instead of being
    /// mapped to a default, so a host-side surprise surfaces as an error.
    pub fn from_config_value(value: &str) -> Result<Self, LockError> {
        value
            .parse()
            .map_err(|_| LockError::InvalidLockState(value.to_string()))
    }
}
