//! Adapter configuration

use std::time::Duration;

/// Behaviour switches for the AG-UI event adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgUiConfig {
    /// Follow every `TOOL_CALL_START` with the serialized arguments
    pub emit_tool_call_args: bool,
    /// Emit `STATE_SNAPSHOT` at start and `STATE_DELTA` at finish
    pub emit_state_events: bool,
    /// Stream thinking as `REASONING_MESSAGE_*` events instead of dropping it
    pub enable_reasoning: bool,
    /// Upper bound for a whole run, from `RUN_STARTED` to `RUN_FINISHED`
    pub run_timeout: Option<Duration>,
}

impl AgUiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_call_args(mut self, emit: bool) -> Self {
        self.emit_tool_call_args = emit;
        self
    }

    pub fn with_state_events(mut self, emit: bool) -> Self {
        self.emit_state_events = emit;
        self
    }

    pub fn with_reasoning(mut self, enable: bool) -> Self {
        self.enable_reasoning = enable;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }
}
