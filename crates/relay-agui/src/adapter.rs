//! Internal event stream to AG-UI event stream

use async_stream::stream;
use futures::Stream;
use relay_core::{AgentRunner, ContentBlock, EventKind, InternalEvent, Message, RunControl, RunRequest};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::AgUiConfig;
use crate::delta::compute_delta;
use crate::events::Event;
use crate::tracker::ConversionState;
use crate::types::RunAgentInput;

/// Tool name used when a result arrives for a call that was never announced
pub const UNKNOWN_TOOL: &str = "unknown";

/// Converts one run into a well-formed AG-UI event sequence.
///
/// Create one adapter per run. `RUN_STARTED` comes first, `RUN_FINISHED`
/// last, and every started message or tool call is ended before the run
/// finishes.
#[derive(Debug)]
pub struct AgUiAdapter {
    thread_id: String,
    run_id: String,
    config: AgUiConfig,
    initial_state: Option<Value>,
    state: ConversionState,
}

impl AgUiAdapter {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>, config: AgUiConfig) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            config,
            initial_state: None,
            state: ConversionState::new(),
        }
    }

    /// Adapter for a client request, seeded with the client's view of the state
    pub fn for_input(input: &RunAgentInput, config: AgUiConfig) -> Self {
        Self::new(input.thread_id.clone(), input.run_id.clone(), config)
            .with_initial_state(input.state.clone())
    }

    /// State that `STATE_SNAPSHOT` reports and `STATE_DELTA` diffs against
    pub fn with_initial_state(mut self, state: Option<Value>) -> Self {
        self.initial_state = state;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn start(&mut self) -> Vec<Event> {
        debug!(thread_id = %self.thread_id, run_id = %self.run_id, "AG-UI run started");
        let mut events = vec![Event::run_started(&self.thread_id, &self.run_id)];
        if self.config.emit_state_events {
            if let Some(snapshot) = &self.initial_state {
                events.push(Event::state_snapshot(snapshot.clone()));
            }
        }
        events
    }

    /// Convert one internal event. Nothing is produced once the run finished.
    pub fn on_event(&mut self, event: &InternalEvent) -> Vec<Event> {
        if self.state.is_finished() {
            debug!(run_id = %self.run_id, "ignoring event after finish");
            return Vec::new();
        }
        match event.kind {
            EventKind::Reasoning if event.is_final => {
                let mut events = self.state.close_text();
                events.extend(self.state.close_reasoning());
                events
            }
            EventKind::Reasoning => self.on_reasoning_delta(&event.message),
            EventKind::ToolResult => self.on_tool_results(&event.message),
            EventKind::AgentResult => Vec::new(),
        }
    }

    /// Report an upstream error, then finish the run
    pub fn on_error(&mut self, message: &str) -> Vec<Event> {
        if self.state.is_finished() {
            return Vec::new();
        }
        let mut events = vec![Event::raw_error(message)];
        events.extend(self.finish(None));
        events
    }

    /// Close everything still open and emit `RUN_FINISHED`. A second call
    /// returns nothing.
    pub fn finish(&mut self, final_state: Option<Value>) -> Vec<Event> {
        if !self.state.mark_finished() {
            return Vec::new();
        }
        let mut events = self.state.close_all();
        if self.config.emit_state_events {
            if let (Some(before), Some(after)) = (&self.initial_state, &final_state) {
                let delta = compute_delta(before, after);
                if !delta.is_empty() {
                    events.push(Event::state_delta(delta));
                }
            }
        }
        events.push(Event::run_finished(&self.thread_id, &self.run_id));
        debug!(thread_id = %self.thread_id, run_id = %self.run_id, "AG-UI run finished");
        events
    }

    /// Drive a whole run: start, stream the runner's events, finish.
    ///
    /// Cancellation and `run_timeout` cover every call into the runner, from
    /// the initial state read to the last event. They stop the runner and
    /// finish the run normally; upstream errors are reported through
    /// [`Self::on_error`].
    pub fn run(
        self,
        runner: Arc<dyn AgentRunner>,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Event> + Send + 'static {
        let mut adapter = self;
        stream! {
            let session_id = request.session_id.clone();
            let run_id = request.run_id.clone();
            let with_state = adapter.config.emit_state_events;
            let control = RunControl::new(cancel, adapter.config.run_timeout);

            let mut interrupted = None;
            if with_state && adapter.initial_state.is_none() {
                match control.guard(runner.state(&session_id)).await {
                    Ok(state) => adapter.initial_state = state,
                    Err(e) => interrupted = Some(e),
                }
            }
            for event in adapter.start() {
                yield event;
            }
            if let Some(e) = interrupted {
                debug!(run_id = %run_id, reason = %e, "AG-UI run interrupted before start");
                for event in adapter.finish(None) {
                    yield event;
                }
                return;
            }

            let started = control
                .guard(runner.run(request, control.token().clone()))
                .await
                .and_then(|started| started);
            let mut events = match started {
                Ok(events) => Some(events),
                Err(e) if e.is_interruption() => {
                    debug!(run_id = %run_id, reason = %e, "AG-UI run interrupted while starting");
                    stop_interrupted(runner.as_ref(), &run_id).await;
                    None
                }
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "agent run failed to start");
                    for event in adapter.on_error(&e.to_string()) {
                        yield event;
                    }
                    return;
                }
            };

            let mut completed = events.is_some();
            while let Some(source) = events.as_mut() {
                match control.next(source).await {
                    Some(Ok(internal)) => {
                        for event in adapter.on_event(&internal) {
                            yield event;
                        }
                    }
                    Some(Err(e)) if e.is_interruption() => {
                        debug!(run_id = %run_id, reason = %e, "AG-UI run interrupted");
                        stop_interrupted(runner.as_ref(), &run_id).await;
                        completed = false;
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(run_id = %run_id, error = %e, "agent stream failed");
                        for event in adapter.on_error(&e.to_string()) {
                            yield event;
                        }
                        return;
                    }
                    None => break,
                }
            }

            let final_state = if with_state && completed {
                control.guard(runner.state(&session_id)).await.unwrap_or_else(|e| {
                    debug!(run_id = %run_id, reason = %e, "skipping final state read");
                    None
                })
            } else {
                None
            };
            for event in adapter.finish(final_state) {
                yield event;
            }
        }
    }

    fn on_reasoning_delta(&mut self, message: &Message) -> Vec<Event> {
        let mut events = Vec::new();
        for block in &message.content {
            match block {
                ContentBlock::Text { text } => {
                    if !text.is_empty() {
                        events.extend(self.state.text_delta(&message.id, text));
                    }
                }
                ContentBlock::Thinking { thinking } => {
                    if self.config.enable_reasoning && !thinking.is_empty() {
                        events.extend(self.state.reasoning_delta(&message.id, thinking));
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    events.extend(self.state.close_text());
                    events.extend(self.state.close_reasoning());
                    if self.state.start_tool_call(id) {
                        events.push(Event::tool_call_start(id, name, Some(message.id.clone())));
                        if self.config.emit_tool_call_args {
                            events.push(Event::tool_call_args(
                                id,
                                Value::Object(input.clone()).to_string(),
                            ));
                        }
                    }
                }
                ContentBlock::Media { .. } | ContentBlock::ToolResult { .. } => {
                    debug!(message_id = %message.id, "skipping block without AG-UI event");
                }
            }
        }
        events
    }

    fn on_tool_results(&mut self, message: &Message) -> Vec<Event> {
        let mut events = Vec::new();
        for block in message.tool_results() {
            let ContentBlock::ToolResult { id, name, .. } = block else {
                continue;
            };
            if !self.state.is_tool_call_started(id) {
                events.extend(self.state.close_text());
                events.extend(self.state.close_reasoning());
                self.state.start_tool_call(id);
                let name = name.as_deref().unwrap_or(UNKNOWN_TOOL);
                events.push(Event::tool_call_start(id, name, None));
            }
            if self.state.end_tool_call(id) {
                events.push(Event::tool_call_end(id));
            }
            events.push(Event::tool_call_result(&message.id, id, block.result_text()));
        }
        events
    }
}

async fn stop_interrupted(runner: &dyn AgentRunner, run_id: &str) {
    if let Err(e) = runner.stop(run_id).await {
        warn!(run_id, error = %e, "failed to stop interrupted run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn adapter(config: AgUiConfig) -> AgUiAdapter {
        AgUiAdapter::new("th1", "r1", config)
    }

    fn text_delta(id: &str, text: &str) -> InternalEvent {
        InternalEvent::reasoning_delta(Message::assistant(id, vec![ContentBlock::text(text)]))
    }

    fn types(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(Event::event_type).collect()
    }

    #[test]
    fn test_start_with_snapshot() {
        let mut a = adapter(AgUiConfig::new().with_state_events(true))
            .with_initial_state(Some(json!({"n": 1})));
        assert_eq!(types(&a.start()), ["RUN_STARTED", "STATE_SNAPSHOT"]);

        let mut plain = adapter(AgUiConfig::default()).with_initial_state(Some(json!({"n": 1})));
        assert_eq!(types(&plain.start()), ["RUN_STARTED"]);
    }

    #[test]
    fn test_final_reasoning_only_closes() {
        let mut a = adapter(AgUiConfig::default());
        a.start();
        a.on_event(&text_delta("m1", "Hi"));
        let events = a.on_event(&InternalEvent::reasoning_final(Message::assistant(
            "m1",
            vec![ContentBlock::text("Hi")],
        )));
        assert_eq!(events, vec![Event::text_message_end("m1")]);
    }

    #[test]
    fn test_tool_use_closes_text_and_attaches_parent() {
        let mut a = adapter(AgUiConfig::new().with_tool_call_args(true));
        a.on_event(&text_delta("m1", "Let me look"));
        let mut input = Map::new();
        input.insert("q".into(), json!("rust"));
        let events = a.on_event(&InternalEvent::reasoning_delta(Message::assistant(
            "m1",
            vec![ContentBlock::tool_use("t1", "lookup", input)],
        )));
        assert_eq!(
            events,
            vec![
                Event::text_message_end("m1"),
                Event::tool_call_start("t1", "lookup", Some("m1".into())),
                Event::tool_call_args("t1", r#"{"q":"rust"}"#),
            ]
        );
    }

    #[test]
    fn test_thinking_dropped_unless_enabled() {
        let thinking = InternalEvent::reasoning_delta(Message::assistant(
            "m1",
            vec![ContentBlock::thinking("hmm")],
        ));
        assert!(adapter(AgUiConfig::default()).on_event(&thinking).is_empty());
        let events = adapter(AgUiConfig::new().with_reasoning(true)).on_event(&thinking);
        assert_eq!(
            types(&events),
            ["REASONING_MESSAGE_START", "REASONING_MESSAGE_CONTENT"]
        );
    }

    #[test]
    fn test_orphan_tool_result_is_synthesized() {
        let mut a = adapter(AgUiConfig::default());
        let events = a.on_event(&InternalEvent::tool_result(Message::tool(
            "tm1",
            vec![ContentBlock::tool_result("t9", None, vec![], Map::new())],
        )));
        assert_eq!(
            events,
            vec![
                Event::tool_call_start("t9", UNKNOWN_TOOL, None),
                Event::tool_call_end("t9"),
                Event::tool_call_result("tm1", "t9", None),
            ]
        );
    }

    #[test]
    fn test_agent_result_is_silent() {
        let mut a = adapter(AgUiConfig::default());
        let events = a.on_event(&InternalEvent::agent_result(Message::assistant(
            "m1",
            vec![ContentBlock::text("done")],
        )));
        assert!(events.is_empty());
    }

    #[test]
    fn test_finish_emits_state_delta() {
        let mut a = adapter(AgUiConfig::new().with_state_events(true))
            .with_initial_state(Some(json!({"n": 1})));
        a.start();
        let events = a.finish(Some(json!({"n": 2})));
        assert_eq!(types(&events), ["STATE_DELTA", "RUN_FINISHED"]);

        let mut unchanged = adapter(AgUiConfig::new().with_state_events(true))
            .with_initial_state(Some(json!({"n": 1})));
        assert_eq!(types(&unchanged.finish(Some(json!({"n": 1})))), ["RUN_FINISHED"]);
    }

    #[test]
    fn test_events_after_finish_are_ignored() {
        let mut a = adapter(AgUiConfig::default());
        a.start();
        a.finish(None);
        assert!(a.on_event(&text_delta("m1", "late")).is_empty());
        assert!(a.on_error("late").is_empty());
        assert!(a.finish(None).is_empty());
    }
}
