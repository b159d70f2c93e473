//! Internal event stream produced by the agent loop

use crate::error::Result;
use crate::types::{ContentBlock, Message};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// What a logical unit of agent output represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Assistant output: text, thinking and tool invocations
    Reasoning,
    /// Output of executed tools
    ToolResult,
    /// The final answer of the run
    AgentResult,
}

/// One event of the internal, protocol-agnostic stream.
///
/// Non-final `Reasoning` events carry only the newly produced suffix of their
/// message. The final event of a unit is a snapshot of the whole unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalEvent {
    pub kind: EventKind,
    pub message: Message,
    #[serde(default)]
    pub is_final: bool,
}

impl InternalEvent {
    pub fn new(kind: EventKind, message: Message, is_final: bool) -> Self {
        Self {
            kind,
            message,
            is_final,
        }
    }

    /// Incremental reasoning delta
    pub fn reasoning_delta(message: Message) -> Self {
        Self::new(EventKind::Reasoning, message, false)
    }

    /// Final reasoning snapshot
    pub fn reasoning_final(message: Message) -> Self {
        Self::new(EventKind::Reasoning, message, true)
    }

    /// Final tool result event
    pub fn tool_result(message: Message) -> Self {
        Self::new(EventKind::ToolResult, message, true)
    }

    /// Final agent result
    pub fn agent_result(message: Message) -> Self {
        Self::new(EventKind::AgentResult, message, true)
    }

    /// Message content blocks
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.message.content
    }

    /// Check whether this event carries an incremental delta
    pub fn is_delta(&self) -> bool {
        !self.is_final
    }
}

/// A stream of internal events. An `Err` item ends the run with an upstream error.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<InternalEvent>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, Role};

    #[test]
    fn test_event_constructors() {
        let msg = Message::new("m1", Role::Assistant, vec![ContentBlock::text("Hi")]);
        let delta = InternalEvent::reasoning_delta(msg.clone());
        assert_eq!(delta.kind, EventKind::Reasoning);
        assert!(delta.is_delta());

        let done = InternalEvent::agent_result(msg);
        assert!(done.is_final);
        assert_eq!(done.blocks().len(), 1);
    }

    #[test]
    fn test_event_deserializes_without_is_final() {
        let ev: InternalEvent = serde_json::from_value(serde_json::json!({
            "kind": "reasoning",
            "message": {"id": "m1", "role": "assistant", "content": [{"type": "text", "text": "Hi"}]}
        }))
        .unwrap();
        assert!(!ev.is_final);
        assert_eq!(ev.message.text(), "Hi");
    }
}
