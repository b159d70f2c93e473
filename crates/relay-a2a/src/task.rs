//! Task lifecycle state machine

use serde_json::Map;

use crate::error::{Error, Result};
use crate::types::{
    A2aMessage, Artifact, Part, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

/// State of one A2A task.
///
/// `submitted -> working -> completed | failed`. Terminal states are final and
/// ids never change after creation.
#[derive(Debug, Clone)]
pub struct TaskLifecycle {
    task_id: String,
    context_id: String,
    state: TaskState,
}

impl TaskLifecycle {
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            state: TaskState::Submitted,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`, rejecting anything that is not a forward step
    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        let allowed = matches!(
            (self.state, next),
            (TaskState::Submitted, TaskState::Working)
                | (TaskState::Submitted, TaskState::Failed)
                | (TaskState::Working, TaskState::Completed)
                | (TaskState::Working, TaskState::Failed)
        );
        if !allowed {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(task_id = %self.task_id, from = %self.state, to = %next, "task transition");
        self.state = next;
        Ok(())
    }

    /// Snapshot of the task
    pub fn task(&self) -> Task {
        Task {
            id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            status: self.status(None),
            artifacts: Vec::new(),
        }
    }

    /// Status update for the current state, final once terminal
    pub fn status_update(&self, message: Option<A2aMessage>) -> TaskStatusUpdateEvent {
        TaskStatusUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            status: self.status(message),
            is_final: self.is_terminal(),
        }
    }

    /// Artifact update carrying `parts`
    pub fn artifact_update(
        &self,
        artifact_id: impl Into<String>,
        name: Option<String>,
        parts: Vec<Part>,
        append: bool,
    ) -> TaskArtifactUpdateEvent {
        TaskArtifactUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            artifact: Artifact {
                artifact_id: artifact_id.into(),
                name,
                parts,
                metadata: Map::new(),
            },
            append,
            last_chunk: false,
        }
    }

    /// Agent message bound to this task
    pub fn message(&self, parts: Vec<Part>) -> A2aMessage {
        A2aMessage::agent(
            parts,
            Some(self.task_id.clone()),
            Some(self.context_id.clone()),
        )
    }

    fn status(&self, message: Option<A2aMessage>) -> TaskStatus {
        TaskStatus {
            state: self.state,
            message,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut task = TaskLifecycle::new("t1", "c1");
        assert_eq!(task.state(), TaskState::Submitted);
        task.transition(TaskState::Working).unwrap();
        task.transition(TaskState::Completed).unwrap();
        assert!(task.is_terminal());
        assert!(task.status_update(None).is_final);
    }

    #[test]
    fn test_terminal_state_is_absorbing() {
        let mut task = TaskLifecycle::new("t1", "c1");
        task.transition(TaskState::Working).unwrap();
        task.transition(TaskState::Failed).unwrap();
        let err = task.transition(TaskState::Completed).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: TaskState::Failed,
                to: TaskState::Completed
            }
        ));
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[test]
    fn test_no_backwards_or_skipping_transitions() {
        let mut task = TaskLifecycle::new("t1", "c1");
        assert!(task.transition(TaskState::Completed).is_err());
        assert!(task.transition(TaskState::Submitted).is_err());
        task.transition(TaskState::Working).unwrap();
        assert!(task.transition(TaskState::Working).is_err());
        assert!(task.transition(TaskState::Submitted).is_err());
    }

    #[test]
    fn test_ids_are_carried_into_wire_objects() {
        let task = TaskLifecycle::new("t1", "c1");
        let update = task.artifact_update("a1", None, vec![Part::text("x")], false);
        assert_eq!(update.task_id, "t1");
        assert_eq!(update.context_id, "c1");
        let msg = task.message(vec![Part::text("done")]);
        assert_eq!(msg.task_id.as_deref(), Some("t1"));
        assert_eq!(msg.context_id.as_deref(), Some("c1"));
        assert_eq!(task.task().status.state, TaskState::Submitted);
    }
}
