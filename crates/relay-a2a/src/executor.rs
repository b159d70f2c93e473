//! Drives agent runs as A2A tasks

use async_stream::stream;
use futures::Stream;
use parking_lot::Mutex;
use relay_core::{
    AgentRunner, ContentBlock, EventKind, InternalEvent, Message, Role, RunControl, RunRequest,
};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec;
use crate::config::A2aConfig;
use crate::error::Result;
use crate::task::TaskLifecycle;
use crate::types::{
    A2aMessage, MessageSendParams, Part, StreamResponse, TaskArtifactUpdateEvent, TaskState,
    TaskStatusUpdateEvent,
};

/// Name of the artifacts that carry tool results
pub const TOOL_RESULT_ARTIFACT: &str = "tool_result";

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Serves `message/send`, `message/stream` and `tasks/cancel` on top of an
/// [`AgentRunner`].
///
/// Cloning is cheap; clones share the set of in-flight tasks so a cancel
/// issued through any clone reaches the running task.
#[derive(Clone)]
pub struct A2aExecutor {
    runner: Arc<dyn AgentRunner>,
    config: A2aConfig,
    in_flight: InFlight,
}

/// A validated request, ready to run
struct PreparedTask {
    task_id: String,
    context_id: String,
    request: RunRequest,
}

/// Keeps a task registered for cancellation while it runs
struct RunGuard {
    task_id: String,
    token: CancellationToken,
    in_flight: InFlight,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.task_id);
    }
}

impl A2aExecutor {
    pub fn new(runner: Arc<dyn AgentRunner>, config: A2aConfig) -> Self {
        Self {
            runner,
            config,
            in_flight: Arc::default(),
        }
    }

    /// Number of tasks currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Blocking delivery: run the task to completion and return one message.
    ///
    /// Never fails; setup and stream errors come back as a text message.
    pub async fn send_message(&self, params: MessageSendParams) -> A2aMessage {
        let (prepared, registration) = match self.admit(&params) {
            Ok(admitted) => admitted,
            Err(e) => {
                warn!(error = %e, "rejecting A2A request");
                return setup_failure(&params, &e);
            }
        };

        let lifecycle = TaskLifecycle::new(&prepared.task_id, &prepared.context_id);
        let control = RunControl::new(registration.token.clone(), self.config.run_timeout);
        let mut aggregate = ResultAggregator::new(self.config.include_internal_events);

        match self.drain(prepared.request, &control, &mut aggregate).await {
            Ok(()) => lifecycle.message(aggregate.into_parts()),
            Err(e) => {
                warn!(task_id = %lifecycle.task_id(), error = %e, "A2A task failed");
                lifecycle.message(vec![Part::text(failure_text(&e))])
            }
        }
    }

    /// Streaming delivery: task snapshot, status updates and artifact updates,
    /// ending with exactly one final status.
    pub fn stream_message(
        &self,
        params: MessageSendParams,
    ) -> impl Stream<Item = StreamResponse> + Send + 'static {
        let executor = self.clone();
        stream! {
            let (prepared, registration) = match executor.admit(&params) {
                Ok(admitted) => admitted,
                Err(e) => {
                    warn!(error = %e, "rejecting A2A request");
                    yield StreamResponse::Message(setup_failure(&params, &e));
                    return;
                }
            };

            let mut lifecycle = TaskLifecycle::new(&prepared.task_id, &prepared.context_id);
            yield StreamResponse::Task(lifecycle.task());

            let include_internal = executor.config.include_internal_events;
            let control = RunControl::new(registration.token.clone(), executor.config.run_timeout);
            let run_id = prepared.request.run_id.clone();

            let started = control
                .guard(executor.runner.run(prepared.request, control.token().clone()))
                .await
                .and_then(|started| started);
            let mut events = match started {
                Ok(events) => events,
                Err(e) => {
                    executor.interrupt(&run_id, &e).await;
                    warn!(task_id = %run_id, error = %e, "agent run failed to start");
                    let message = lifecycle.message(vec![Part::text(failure_text(&e))]);
                    if let Some(update) = advance(&mut lifecycle, TaskState::Failed, Some(message)) {
                        yield StreamResponse::StatusUpdate(update);
                    }
                    return;
                }
            };

            if let Some(update) = advance(&mut lifecycle, TaskState::Working, None) {
                yield StreamResponse::StatusUpdate(update);
            }

            let mut aggregate = ResultAggregator::new(include_internal);
            let mut artifacts = ArtifactTracker::default();
            loop {
                match control.next(&mut events).await {
                    Some(Ok(event)) => {
                        if let Some(update) = artifacts.update(&lifecycle, &event, include_internal) {
                            yield StreamResponse::ArtifactUpdate(update);
                        }
                        aggregate.observe(&event);
                    }
                    Some(Err(e)) => {
                        executor.interrupt(&run_id, &e).await;
                        warn!(task_id = %run_id, error = %e, "A2A task failed");
                        let message = lifecycle.message(vec![Part::text(failure_text(&e))]);
                        if let Some(update) = advance(&mut lifecycle, TaskState::Failed, Some(message)) {
                            yield StreamResponse::StatusUpdate(update);
                        }
                        return;
                    }
                    None => break,
                }
            }

            let message = executor
                .config
                .complete_with_message
                .then(|| lifecycle.message(aggregate.into_parts()));
            if let Some(update) = advance(&mut lifecycle, TaskState::Completed, message) {
                yield StreamResponse::StatusUpdate(update);
            }
        }
    }

    /// Ask a running task to stop.
    ///
    /// Succeeds when no task is running under `task_id`. The running execution
    /// reports its own terminal status.
    pub async fn cancel(&self, task_id: &str) -> Result<()> {
        let token = self.in_flight.lock().get(task_id).cloned();
        if let Some(token) = &token {
            token.cancel();
        }
        let stopped = self.runner.stop(task_id).await?;
        debug!(task_id, in_flight = token.is_some(), stopped, "A2A cancel requested");
        Ok(())
    }

    fn prepare(&self, params: &MessageSendParams) -> relay_core::Result<PreparedTask> {
        let inbound = &params.message;
        let content = codec::parse_parts(&inbound.parts);
        if content.is_empty() {
            return Err(relay_core::Error::invalid_request(
                "message contains no supported parts",
            ));
        }

        let task_id = inbound.task_id.clone().unwrap_or_else(new_id);
        let context_id = inbound.context_id.clone().unwrap_or_else(new_id);
        let message = Message::new(inbound.message_id.clone(), Role::User, content);
        Ok(PreparedTask {
            request: RunRequest::new(task_id.clone(), context_id.clone(), vec![message]),
            task_id,
            context_id,
        })
    }

    /// Validate a request and register its task for cancellation
    fn admit(&self, params: &MessageSendParams) -> relay_core::Result<(PreparedTask, RunGuard)> {
        let prepared = self.prepare(params)?;
        let registration = self.register(&prepared.task_id)?;
        Ok((prepared, registration))
    }

    /// Fails when a task with the same id is already running
    fn register(&self, task_id: &str) -> relay_core::Result<RunGuard> {
        let token = CancellationToken::new();
        match self.in_flight.lock().entry(task_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(relay_core::Error::invalid_request(format!(
                    "task {task_id} is already running"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }
        Ok(RunGuard {
            task_id: task_id.to_string(),
            token,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    async fn drain(
        &self,
        request: RunRequest,
        control: &RunControl,
        aggregate: &mut ResultAggregator,
    ) -> relay_core::Result<()> {
        let run_id = request.run_id.clone();
        let started = control
            .guard(self.runner.run(request, control.token().clone()))
            .await
            .and_then(|started| started);
        let mut events = match started {
            Ok(events) => events,
            Err(e) => {
                self.interrupt(&run_id, &e).await;
                return Err(e);
            }
        };
        while let Some(item) = control.next(&mut events).await {
            match item {
                Ok(event) => aggregate.observe(&event),
                Err(e) => {
                    self.interrupt(&run_id, &e).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Stop the runner when the run was cut short on our side
    async fn interrupt(&self, run_id: &str, error: &relay_core::Error) {
        if !error.is_interruption() {
            return;
        }
        if let Err(e) = self.runner.stop(run_id).await {
            warn!(run_id, error = %e, "failed to stop interrupted run");
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn failure_text(error: &relay_core::Error) -> String {
    match error {
        relay_core::Error::Cancelled => "Agent execution cancelled".to_string(),
        relay_core::Error::Timeout(_) => "Agent execution timed out".to_string(),
        other => format!("Agent execution failed: {other}"),
    }
}

fn setup_failure(params: &MessageSendParams, error: &relay_core::Error) -> A2aMessage {
    A2aMessage::agent(
        vec![Part::text(failure_text(error))],
        params.message.task_id.clone(),
        params.message.context_id.clone(),
    )
}

fn advance(
    lifecycle: &mut TaskLifecycle,
    next: TaskState,
    message: Option<A2aMessage>,
) -> Option<TaskStatusUpdateEvent> {
    match lifecycle.transition(next) {
        Ok(()) => Some(lifecycle.status_update(message)),
        Err(e) => {
            warn!(task_id = %lifecycle.task_id(), error = %e, "dropping status update");
            None
        }
    }
}

/// Collects the answer of a run.
///
/// Only non-final reasoning text counts; the final reasoning event repeats
/// what the deltas already delivered.
struct ResultAggregator {
    include_internal: bool,
    text: String,
    saw_delta: bool,
    agent_result: Option<String>,
    side_parts: Vec<Part>,
}

impl ResultAggregator {
    fn new(include_internal: bool) -> Self {
        Self {
            include_internal,
            text: String::new(),
            saw_delta: false,
            agent_result: None,
            side_parts: Vec::new(),
        }
    }

    fn observe(&mut self, event: &InternalEvent) {
        match event.kind {
            EventKind::Reasoning => {
                if event.is_final {
                    return;
                }
                for text in event.blocks().iter().filter_map(ContentBlock::as_text) {
                    if !text.is_empty() {
                        self.text.push_str(text);
                        self.saw_delta = true;
                    }
                }
            }
            EventKind::AgentResult => {
                let text = event.message.text();
                if !text.is_empty() {
                    self.agent_result = Some(text);
                }
            }
            EventKind::ToolResult => {
                if self.include_internal {
                    self.side_parts
                        .extend(codec::serialize_blocks(event.message.tool_results()));
                }
            }
        }
    }

    fn text(&self) -> &str {
        if self.saw_delta {
            &self.text
        } else {
            self.agent_result.as_deref().unwrap_or_default()
        }
    }

    /// Side parts first, then the text answer
    fn into_parts(self) -> Vec<Part> {
        let text = self.text().to_string();
        let mut parts = self.side_parts;
        if !text.is_empty() || parts.is_empty() {
            parts.push(Part::text(text));
        }
        parts
    }
}

/// Tracks which artifacts have already received a chunk
#[derive(Default)]
struct ArtifactTracker {
    started: HashSet<String>,
}

impl ArtifactTracker {
    fn update(
        &mut self,
        lifecycle: &TaskLifecycle,
        event: &InternalEvent,
        include_internal: bool,
    ) -> Option<TaskArtifactUpdateEvent> {
        match event.kind {
            EventKind::Reasoning if !event.is_final => {
                let parts: Vec<Part> = event
                    .blocks()
                    .iter()
                    .filter(|block| streams_as_artifact(block, include_internal))
                    .filter_map(codec::serialize_block)
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                let artifact_id = format!("artifact-{}", event.message.id);
                let append = !self.started.insert(artifact_id.clone());
                Some(lifecycle.artifact_update(artifact_id, None, parts, append))
            }
            EventKind::ToolResult if include_internal => {
                let parts = codec::serialize_blocks(event.message.tool_results());
                if parts.is_empty() {
                    return None;
                }
                Some(lifecycle.artifact_update(
                    format!("tool-result-{}", event.message.id),
                    Some(TOOL_RESULT_ARTIFACT.to_string()),
                    parts,
                    false,
                ))
            }
            _ => None,
        }
    }
}

fn streams_as_artifact(block: &ContentBlock, include_internal: bool) -> bool {
    match block {
        ContentBlock::Text { text } => !text.is_empty(),
        ContentBlock::Thinking { thinking } => include_internal && !thinking.is_empty(),
        ContentBlock::ToolUse { .. } => include_internal,
        ContentBlock::Media { .. } | ContentBlock::ToolResult { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{MediaKind, MediaSource};
    use serde_json::Map;

    fn reasoning(text: &str, is_final: bool) -> InternalEvent {
        InternalEvent::new(
            EventKind::Reasoning,
            Message::assistant("m1", vec![ContentBlock::text(text)]),
            is_final,
        )
    }

    fn tool_result_event(id: &str, output: &str) -> InternalEvent {
        InternalEvent::tool_result(Message::tool(
            "tr1",
            vec![ContentBlock::tool_result(
                id,
                Some("lookup".into()),
                vec![ContentBlock::text(output)],
                Map::new(),
            )],
        ))
    }

    #[test]
    fn test_aggregator_ignores_final_reasoning() {
        let mut agg = ResultAggregator::new(false);
        agg.observe(&reasoning("Hi", false));
        agg.observe(&reasoning("Hi there", true));
        assert_eq!(agg.into_parts(), vec![Part::text("Hi")]);
    }

    #[test]
    fn test_aggregator_falls_back_to_agent_result() {
        let mut agg = ResultAggregator::new(false);
        agg.observe(&reasoning("full answer", true));
        agg.observe(&InternalEvent::agent_result(Message::assistant(
            "m2",
            vec![ContentBlock::text("full answer")],
        )));
        assert_eq!(agg.into_parts(), vec![Part::text("full answer")]);
    }

    #[test]
    fn test_aggregator_puts_tool_results_first() {
        let mut agg = ResultAggregator::new(true);
        agg.observe(&reasoning("The answer is ", false));
        agg.observe(&tool_result_event("t1", "42"));
        agg.observe(&reasoning("42", false));
        let parts = agg.into_parts();
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], Part::Data { .. }));
        assert_eq!(parts[1], Part::text("The answer is 42"));
    }

    #[test]
    fn test_aggregator_skips_tool_results_when_disabled() {
        let mut agg = ResultAggregator::new(false);
        agg.observe(&tool_result_event("t1", "42"));
        assert_eq!(agg.into_parts(), vec![Part::text("")]);
    }

    #[test]
    fn test_artifact_tracker_appends_per_message() {
        let lifecycle = TaskLifecycle::new("t1", "c1");
        let mut tracker = ArtifactTracker::default();
        let first = tracker.update(&lifecycle, &reasoning("a", false), false).unwrap();
        let second = tracker.update(&lifecycle, &reasoning("b", false), false).unwrap();
        assert!(!first.append);
        assert!(second.append);
        assert_eq!(first.artifact.artifact_id, second.artifact.artifact_id);
        assert!(tracker.update(&lifecycle, &reasoning("ab", true), false).is_none());
    }

    #[test]
    fn test_artifact_tracker_filters_internal_blocks() {
        let lifecycle = TaskLifecycle::new("t1", "c1");
        let event = InternalEvent::reasoning_delta(Message::assistant(
            "m1",
            vec![
                ContentBlock::thinking("hmm"),
                ContentBlock::tool_use("call_1", "lookup", Map::new()),
                ContentBlock::media(MediaKind::Image, MediaSource::url("https://x/a.png", None)),
            ],
        ));
        let mut tracker = ArtifactTracker::default();
        assert!(tracker.update(&lifecycle, &event, false).is_none());
        let update = tracker.update(&lifecycle, &event, true).unwrap();
        assert_eq!(update.artifact.parts.len(), 2);
    }

    #[test]
    fn test_failure_text() {
        assert_eq!(
            failure_text(&relay_core::Error::stream("boom")),
            "Agent execution failed: boom"
        );
        assert_eq!(
            failure_text(&relay_core::Error::Cancelled),
            "Agent execution cancelled"
        );
    }
}
