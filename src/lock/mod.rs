//! Settings menu lock: state, events, button rendering and the controller
//! that ties them together.

pub mod affordance;
pub mod controller;
pub mod events;
pub mod host;
pub mod state;

pub use controller::{LockController, PendingPrompt};
pub use events::{AutoLockTrigger, HostEvent, StandbyState};
pub use host::{DeviceUi, LockHost, SettingsStore};
pub use state::LockState;
