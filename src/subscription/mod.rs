//! Subscription Manager: per-websocket-connection client egress.
//!
//! One manager instance is owned by each accepted websocket connection; it
//! never reaches across connections.

mod manager;

pub use manager::{ClientSink, ClientWriteError, SubscriptionManager};
