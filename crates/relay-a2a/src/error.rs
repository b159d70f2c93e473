//! Error types for relay-a2a

use thiserror::Error;

use crate::types::TaskState;

/// Result type alias using relay-a2a Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an A2A task
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the core layer (runner, stream, request setup)
    #[error(transparent)]
    Core(#[from] relay_core::Error),

    /// A task state change that the lifecycle does not allow
    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskState, to: TaskState },
}
