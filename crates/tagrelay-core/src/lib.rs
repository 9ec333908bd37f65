//! Core domain + application logic for the affiliate link relay.
//!
//! This crate is framework-agnostic. Telegram lives behind the outbound port
//! (`messaging::port::OutboundPort`) implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod links;
pub mod logging;
pub mod messaging;
pub mod relay;

pub use errors::{Error, Result};
