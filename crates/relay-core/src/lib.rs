//! relay-core: protocol-agnostic content model and agent event stream
//!
//! This crate defines what the agent loop produces (content blocks, messages,
//! internal events) and the narrow [`AgentRunner`] interface the protocol
//! adapters consume.

pub mod control;
pub mod error;
pub mod replay;
pub mod runner;
pub mod stream;
pub mod types;

pub use control::RunControl;
pub use error::{Error, Result};
pub use replay::{ReplayRunner, ScriptStep};
pub use runner::{AgentRunner, RunRequest};
pub use stream::{AgentEventStream, EventKind, InternalEvent};
pub use types::*;
