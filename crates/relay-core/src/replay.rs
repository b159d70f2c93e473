//! A runner that replays a scripted event stream.
//!
//! Used by the CLI to drive the adapters without a model behind them, and by
//! tests across the workspace.

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::runner::{AgentRunner, RunRequest};
use crate::stream::{AgentEventStream, InternalEvent};

/// One step of a replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    /// Terminate the stream with an upstream error
    Error { error: String },
    /// Wait before producing the next step
    Pause { pause_ms: u64 },
    /// Produce an event
    Event(InternalEvent),
}

type ActiveRuns = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Replays a fixed list of steps for every run
#[derive(Clone, Default)]
pub struct ReplayRunner {
    steps: Vec<ScriptStep>,
    state: Option<Value>,
    active: ActiveRuns,
}

impl ReplayRunner {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            state: None,
            active: Arc::default(),
        }
    }

    /// Replay only events, no errors or pauses
    pub fn from_events(events: Vec<InternalEvent>) -> Self {
        Self::new(events.into_iter().map(ScriptStep::Event).collect())
    }

    /// Report `state` from [`AgentRunner::state`]
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Parse a script from a JSON array or from JSON lines
    pub fn parse_script(input: &str) -> Result<Vec<ScriptStep>> {
        let trimmed = input.trim_start();
        if trimmed.starts_with('[') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }

    /// Load a script file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_request(format!("cannot read script {}: {}", path.display(), e))
        })?;
        Ok(Self::new(Self::parse_script(&content)?))
    }

    /// Number of runs currently in flight
    pub fn active_runs(&self) -> usize {
        self.active.lock().len()
    }
}

/// Removes a run from the active set when its stream is dropped
struct ActiveGuard {
    run_id: String,
    active: ActiveRuns,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.run_id);
    }
}

#[async_trait]
impl AgentRunner for ReplayRunner {
    async fn run(&self, request: RunRequest, cancel: CancellationToken) -> Result<AgentEventStream> {
        let run_token = cancel.child_token();
        self.active
            .lock()
            .insert(request.run_id.clone(), run_token.clone());
        tracing::debug!(run_id = %request.run_id, steps = self.steps.len(), "replay run started");

        let guard = ActiveGuard {
            run_id: request.run_id,
            active: Arc::clone(&self.active),
        };
        let steps = self.steps.clone();

        let event_stream: AgentEventStream = Box::pin(stream! {
            let _guard = guard;
            for step in steps {
                if run_token.is_cancelled() {
                    tracing::debug!("replay run cancelled");
                    return;
                }
                match step {
                    ScriptStep::Event(event) => yield Ok(event),
                    ScriptStep::Error { error } => {
                        yield Err(Error::stream(error));
                        return;
                    }
                    ScriptStep::Pause { pause_ms } => {
                        tokio::select! {
                            _ = run_token.cancelled() => {
                                tracing::debug!("replay run cancelled while paused");
                                return;
                            }
                            _ = tokio::time::sleep(Duration::from_millis(pause_ms)) => {}
                        }
                    }
                }
            }
        });

        Ok(event_stream)
    }

    async fn stop(&self, run_id: &str) -> Result<bool> {
        let token = self.active.lock().get(run_id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn state(&self, _session_id: &str) -> Option<Value> {
        self.state.clone()
    }
}
