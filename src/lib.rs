//! Settings lock library.
//!
//! Locks the settings menu of a Cisco collaboration endpoint behind a PIN,
//! with a control panel button to toggle it and automatic locking on
//! standby, halfwake and room cleanup. The endpoint is reached over its xAPI
//! WebSocket.

pub mod config;
pub mod error;
pub mod instance_lock;
pub mod lock;
pub mod xapi;
