/// Core error type for the relay.
///
/// Only `Config` and `Transport` are fatal. `Resolve` never leaves the link
/// resolver, and `Dispatch` is reported per message by the transport handler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("shortlink resolution failed: {0}")]
    Resolve(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
