//! Outbound side of the relay: the send port, its payloads, and decorators.

pub mod port;
pub mod throttled;
pub mod types;
