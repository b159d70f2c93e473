//! Error types for relay-agui

use thiserror::Error;

/// Result type alias using relay-agui Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while adapting a run to AG-UI
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the core layer (runner, stream, request setup)
    #[error(transparent)]
    Core(#[from] relay_core::Error),

    /// A state patch could not be applied
    #[error("Patch error: {0}")]
    Patch(#[from] json_patch::PatchError),
}
