//! Per-run start/content/end bookkeeping

use std::collections::HashSet;

use crate::events::Event;

/// Ids that have been started, in start order, and the subset already ended
#[derive(Debug, Default)]
struct Lifecycle {
    order: Vec<String>,
    started: HashSet<String>,
    ended: HashSet<String>,
}

impl Lifecycle {
    fn start(&mut self, id: &str) -> bool {
        if !self.started.insert(id.to_string()) {
            return false;
        }
        self.order.push(id.to_string());
        true
    }

    fn end(&mut self, id: &str) -> bool {
        self.started.contains(id) && self.ended.insert(id.to_string())
    }

    fn is_started(&self, id: &str) -> bool {
        self.started.contains(id)
    }

    fn is_ended(&self, id: &str) -> bool {
        self.ended.contains(id)
    }

    fn unended(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| !self.ended.contains(*id))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Text,
    Reasoning,
}

impl Channel {
    fn start(self, id: &str) -> Event {
        match self {
            Self::Text => Event::text_message_start(id),
            Self::Reasoning => Event::reasoning_message_start(id),
        }
    }

    fn content(self, id: &str, delta: &str) -> Event {
        match self {
            Self::Text => Event::text_message_content(id, delta),
            Self::Reasoning => Event::reasoning_message_content(id, delta),
        }
    }

    fn end(self, id: &str) -> Event {
        match self {
            Self::Text => Event::text_message_end(id),
            Self::Reasoning => Event::reasoning_message_end(id),
        }
    }
}

/// A message channel with at most one open message.
///
/// Content arriving for a message whose framing already ended opens a new
/// wire message `<id>_<n>`, so every wire id sees Start, Content, End once.
#[derive(Debug)]
struct MessageTrack {
    channel: Channel,
    ids: Lifecycle,
    /// (source message id, wire message id)
    open: Option<(String, String)>,
}

impl MessageTrack {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            ids: Lifecycle::default(),
            open: None,
        }
    }

    fn push(&mut self, source_id: &str, delta: &str, events: &mut Vec<Event>) {
        let wire_id = match &self.open {
            Some((source, wire)) if source == source_id => wire.clone(),
            _ => {
                self.close(events);
                let wire = self.fresh_id(source_id);
                self.ids.start(&wire);
                events.push(self.channel.start(&wire));
                self.open = Some((source_id.to_string(), wire.clone()));
                wire
            }
        };
        events.push(self.channel.content(&wire_id, delta));
    }

    fn close(&mut self, events: &mut Vec<Event>) {
        if let Some((_, wire)) = self.open.take() {
            if self.ids.end(&wire) {
                events.push(self.channel.end(&wire));
            }
        }
    }

    fn open_id(&self) -> Option<&str> {
        self.open.as_ref().map(|(_, wire)| wire.as_str())
    }

    fn fresh_id(&self, source_id: &str) -> String {
        if !self.ids.is_started(source_id) {
            return source_id.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{source_id}_{n}");
            if !self.ids.is_started(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Conversion state of one run.
///
/// Owned by a single adapter and never shared between runs. Guarantees at
/// most one open text message and at most one open reasoning message.
#[derive(Debug)]
pub struct ConversionState {
    text: MessageTrack,
    reasoning: MessageTrack,
    tool_calls: Lifecycle,
    finished: bool,
}

impl Default for ConversionState {
    fn default() -> Self {
        Self {
            text: MessageTrack::new(Channel::Text),
            reasoning: MessageTrack::new(Channel::Reasoning),
            tool_calls: Lifecycle::default(),
            finished: false,
        }
    }
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text to `message_id`, opening its text message if needed
    pub fn text_delta(&mut self, message_id: &str, delta: &str) -> Vec<Event> {
        let mut events = Vec::new();
        self.text.push(message_id, delta, &mut events);
        events
    }

    /// Append reasoning to `message_id`. Opening a reasoning message closes
    /// the open text message.
    pub fn reasoning_delta(&mut self, message_id: &str, delta: &str) -> Vec<Event> {
        let mut events = Vec::new();
        if self.reasoning.open.as_ref().map(|(source, _)| source.as_str()) != Some(message_id) {
            self.text.close(&mut events);
        }
        self.reasoning.push(message_id, delta, &mut events);
        events
    }

    pub fn close_text(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.text.close(&mut events);
        events
    }

    pub fn close_reasoning(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.reasoning.close(&mut events);
        events
    }

    /// Record a tool call start; false if it was already started
    pub fn start_tool_call(&mut self, tool_call_id: &str) -> bool {
        self.tool_calls.start(tool_call_id)
    }

    /// Record a tool call end; false if never started or already ended
    pub fn end_tool_call(&mut self, tool_call_id: &str) -> bool {
        self.tool_calls.end(tool_call_id)
    }

    pub fn is_tool_call_started(&self, tool_call_id: &str) -> bool {
        self.tool_calls.is_started(tool_call_id)
    }

    pub fn is_tool_call_ended(&self, tool_call_id: &str) -> bool {
        self.tool_calls.is_ended(tool_call_id)
    }

    pub fn open_text_id(&self) -> Option<&str> {
        self.text.open_id()
    }

    pub fn open_reasoning_id(&self) -> Option<&str> {
        self.reasoning.open_id()
    }

    /// End everything still open: text first, then tool calls, then reasoning
    pub fn close_all(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.text.close(&mut events);
        for id in self.tool_calls.unended() {
            self.tool_calls.end(&id);
            events.push(Event::tool_call_end(id));
        }
        self.reasoning.close(&mut events);
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Mark the run finished; false if it already was
    pub fn mark_finished(&mut self) -> bool {
        !std::mem::replace(&mut self.finished, true)
    }
}
