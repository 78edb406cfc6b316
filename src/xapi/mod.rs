//! xAPI transport: JSON-RPC over WebSocket to the endpoint.
//!
//! Provides the client, the feedback subscriptions the lock controller needs,
//! and the host interface implementation on top of xAPI paths.

mod client;
pub mod feedback;
mod host;
pub mod rpc;
mod tls;

pub use client::XapiClient;
pub use host::parse_panel_list;
