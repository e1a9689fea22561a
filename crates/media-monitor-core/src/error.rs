//! Error types.
//!
//! None of these ever cross a context boundary. Receivers use them to decide
//! that a message is foreign or malformed, and then drop it.

use thiserror::Error;

/// Raw bus value could not be read as a monitor envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Message has no source tag")]
    MissingSource,
    #[error("Message from foreign source: {0}")]
    ForeignSource(String),
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remote command rejected at the boundary.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Invalid payload for {name}: {source}")]
    InvalidPayload {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
