//! Adapter configuration

use std::time::Duration;

/// Behaviour switches for the A2A task adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct A2aConfig {
    /// Surface tool results (and, when streaming, thinking and tool calls) as artifacts
    pub include_internal_events: bool,
    /// Attach the aggregated answer to the final `completed` status
    pub complete_with_message: bool,
    /// Upper bound for a whole run, from `submitted` to the terminal status
    pub run_timeout: Option<Duration>,
}

impl A2aConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_internal_events(mut self, include: bool) -> Self {
        self.include_internal_events = include;
        self
    }

    pub fn with_complete_message(mut self, complete_with_message: bool) -> Self {
        self.complete_with_message = complete_with_message;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }
}
