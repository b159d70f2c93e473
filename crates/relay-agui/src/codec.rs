//! Mapping from AG-UI request content to the internal content model

use relay_core::{ContentBlock, MediaSource, Message, Role, RunRequest, new_message_id};
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::{self, InputContent, MessageContent, RunAgentInput};

/// Parse one input part. Unsupported or malformed parts are dropped.
pub fn parse_input_content(part: &InputContent) -> Option<ContentBlock> {
    match part {
        InputContent::Text { text } => Some(ContentBlock::text(text.clone())),
        InputContent::Binary {
            mime_type,
            data,
            url,
            ..
        } => parse_binary(mime_type, data.as_deref(), url.as_deref()),
    }
}

/// Serialize a block as an input part. Only text and media have one.
pub fn serialize_input_content(block: &ContentBlock) -> Option<InputContent> {
    match block {
        ContentBlock::Text { text } => Some(InputContent::text(text.clone())),
        ContentBlock::Media { kind, source } => Some(match source {
            MediaSource::Base64 { data, media_type } => InputContent::Binary {
                mime_type: media_type.clone(),
                data: Some(data.clone()),
                url: None,
                id: None,
                filename: None,
            },
            MediaSource::Url { url, media_type } => InputContent::Binary {
                mime_type: media_type
                    .clone()
                    .unwrap_or_else(|| kind.wildcard_mime_type()),
                data: None,
                url: Some(url.clone()),
                id: None,
                filename: None,
            },
        }),
        _ => None,
    }
}

/// Convert an AG-UI message to an internal message.
///
/// Returns `None` when nothing of the message survives conversion.
pub fn parse_message(message: &types::Message) -> Option<Message> {
    let id = message.id.clone().unwrap_or_else(new_message_id);
    let (role, content) = match message.role {
        types::Role::User => (Role::User, parse_content(message.content.as_ref())),
        types::Role::System | types::Role::Developer => {
            (Role::System, parse_content(message.content.as_ref()))
        }
        types::Role::Assistant => {
            let mut content = parse_content(message.content.as_ref());
            content.extend(message.tool_calls.iter().filter_map(parse_tool_call));
            (Role::Assistant, content)
        }
        types::Role::Tool => {
            let Some(tool_call_id) = message.tool_call_id.clone() else {
                warn!(message_id = %id, "dropping tool message without toolCallId");
                return None;
            };
            let output = parse_content(message.content.as_ref());
            let result = ContentBlock::tool_result(tool_call_id, None, output, Map::new());
            (Role::Tool, vec![result])
        }
    };

    if content.is_empty() {
        warn!(message_id = %id, "dropping message without supported content");
        return None;
    }
    Some(Message::new(id, role, content))
}

/// Turn a run request into the input for the agent runner
pub fn parse_run_input(input: &RunAgentInput) -> relay_core::Result<RunRequest> {
    let messages: Vec<Message> = input.messages.iter().filter_map(parse_message).collect();
    if messages.is_empty() {
        return Err(relay_core::Error::invalid_request(
            "run input contains no usable messages",
        ));
    }
    Ok(RunRequest::new(
        input.run_id.clone(),
        input.thread_id.clone(),
        messages,
    ))
}

fn parse_content(content: Option<&MessageContent>) -> Vec<ContentBlock> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) if text.is_empty() => Vec::new(),
        Some(MessageContent::Text(text)) => vec![ContentBlock::text(text.clone())],
        Some(MessageContent::Parts(parts)) => {
            parts.iter().filter_map(parse_input_content).collect()
        }
    }
}

fn parse_tool_call(call: &types::ToolCall) -> Option<ContentBlock> {
    let arguments = call.function.arguments.trim();
    let input = if arguments.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(arguments) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(tool_call_id = %call.id, "dropping tool call with non-object arguments");
                return None;
            }
            Err(e) => {
                warn!(tool_call_id = %call.id, error = %e, "dropping tool call with malformed arguments");
                return None;
            }
        }
    };
    Some(ContentBlock::tool_use(
        call.id.clone(),
        call.function.name.clone(),
        input,
    ))
}

fn parse_binary(mime_type: &str, data: Option<&str>, url: Option<&str>) -> Option<ContentBlock> {
    match ContentBlock::media_from_wire(
        Some(mime_type),
        data.map(str::to_string),
        url.map(str::to_string),
    ) {
        Ok(block) => Some(block),
        Err(e) => {
            warn!(error = %e, "dropping binary part");
            None
        }
    }
}
