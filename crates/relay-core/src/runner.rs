//! Abstraction over the agent loop that produces internal events

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stream::AgentEventStream;
use crate::types::Message;

/// Input for one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Identifier of this run, also used by [`AgentRunner::stop`]
    pub run_id: String,
    /// Conversation the run belongs to
    pub session_id: String,
    /// New input messages for the run
    pub messages: Vec<Message>,
}

impl RunRequest {
    pub fn new(
        run_id: impl Into<String>,
        session_id: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            session_id: session_id.into(),
            messages,
        }
    }
}

/// The agent loop, seen from the protocol adapters
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Start a run and stream its events. The runner should stop producing
    /// events once `cancel` fires.
    async fn run(&self, request: RunRequest, cancel: CancellationToken)
    -> Result<AgentEventStream>;

    /// Stop the run registered under `run_id`.
    ///
    /// Idempotent: returns `Ok(false)` when no such run is active.
    async fn stop(&self, run_id: &str) -> Result<bool>;

    /// Agent-side state for a session, if the agent exposes any
    async fn state(&self, _session_id: &str) -> Option<Value> {
        None
    }
}
