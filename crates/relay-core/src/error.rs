//! Error types for relay-core

use thiserror::Error;

/// Result type alias using relay-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the content model, the event stream and agent runners
#[derive(Error, Debug)]
pub enum Error {
    /// Media source built with neither or both of inline bytes / URL
    #[error("Invalid media source: {0}")]
    InvalidMediaSource(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The agent's event stream terminated with an error
    #[error("{0}")]
    Stream(String),

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// The run exceeded its configured timeout
    #[error("Run timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Inbound request could not be turned into a run
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The agent runner failed to start or stop a run
    #[error("Runner error: {0}")]
    Runner(String),
}

impl Error {
    /// Create an upstream stream error
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether this error ends a run without the agent failing on its own
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout(_))
    }
}
