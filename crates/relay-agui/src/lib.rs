//! relay-agui: stream an agent run as AG-UI events
//!
//! [`AgUiAdapter`] frames the internal event stream of one run into
//! `RUN_STARTED`, text/reasoning message and tool call lifecycles, optional
//! state events and `RUN_FINISHED`. [`codec`] turns `RunAgentInput` requests
//! into runner input and [`delta`] computes the state patches.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod delta;
pub mod error;
pub mod events;
pub mod tracker;
pub mod types;

pub use adapter::{AgUiAdapter, UNKNOWN_TOOL};
pub use config::AgUiConfig;
pub use delta::{PatchOperation, apply_delta, compute_delta};
pub use error::{Error, Result};
pub use events::Event;
pub use tracker::ConversionState;
pub use types::{FunctionCall, InputContent, Message, MessageContent, Role, RunAgentInput, ToolCall};
