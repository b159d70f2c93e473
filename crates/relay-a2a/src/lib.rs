//! relay-a2a: serve an agent runner over the A2A task protocol
//!
//! [`A2aExecutor`] turns one inbound message into a task that moves through
//! `submitted -> working -> completed | failed`, delivered either as a single
//! reply ([`A2aExecutor::send_message`]) or as a stream of task, status and
//! artifact updates ([`A2aExecutor::stream_message`]).

pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod task;
pub mod types;

pub use config::A2aConfig;
pub use error::{Error, Result};
pub use executor::{A2aExecutor, TOOL_RESULT_ARTIFACT};
pub use task::TaskLifecycle;
pub use types::*;
