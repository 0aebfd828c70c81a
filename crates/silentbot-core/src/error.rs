//! Error types for SilentBot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure talking to a node. Always retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node understood the request and refused it.
    #[error("Node rejected request: {0}")]
    Rejected(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether repeating the identical request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
