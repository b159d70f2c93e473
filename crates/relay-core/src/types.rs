//! Core content types shared by every protocol adapter

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Kind of media carried by a [`ContentBlock::Media`] block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Pick the media kind from the primary component of a MIME type
    /// (`image/png` -> `Image`). Returns `None` for anything else.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let primary = mime_type.split('/').next()?.trim().to_ascii_lowercase();
        match primary.as_str() {
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Wildcard MIME type for this kind, e.g. `image/*`
    pub fn wildcard_mime_type(&self) -> String {
        format!("{}/*", self.as_str())
    }
}

/// Where the bytes of a media block live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    /// Inline base64 data
    Base64 { data: String, media_type: String },
    /// Remote reference
    Url {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

impl MediaSource {
    /// Build a media source from optional inline data and an optional URL.
    ///
    /// Exactly one of `data` and `url` must be set, and inline data needs a
    /// media type.
    pub fn try_new(
        data: Option<String>,
        url: Option<String>,
        media_type: Option<String>,
    ) -> Result<Self> {
        match (data, url) {
            (Some(data), None) => {
                let media_type = media_type.ok_or_else(|| {
                    Error::InvalidMediaSource("inline data requires a media type".into())
                })?;
                Ok(Self::Base64 { data, media_type })
            }
            (None, Some(url)) => Ok(Self::url(url, media_type)),
            (Some(_), Some(_)) => Err(Error::InvalidMediaSource(
                "both inline data and url are set".into(),
            )),
            (None, None) => Err(Error::InvalidMediaSource(
                "neither inline data nor url is set".into(),
            )),
        }
    }

    /// Create an inline base64 source
    pub fn base64(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::Base64 {
            data: data.into(),
            media_type: media_type.into(),
        }
    }

    /// Create a URL source. A bare wildcard such as `image/*` names no
    /// concrete type and is stored as `None`.
    pub fn url(url: impl Into<String>, media_type: Option<String>) -> Self {
        Self::Url {
            url: url.into(),
            media_type: media_type.filter(|m| !is_wildcard_mime_type(m)),
        }
    }

    pub fn media_type(&self) -> Option<&str> {
        match self {
            Self::Base64 { media_type, .. } => Some(media_type),
            Self::Url { media_type, .. } => media_type.as_deref(),
        }
    }
}

fn is_wildcard_mime_type(mime_type: &str) -> bool {
    mime_type
        .split_once('/')
        .is_some_and(|(_, subtype)| subtype.trim() == "*")
}

/// One typed unit of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Visible text
    Text { text: String },
    /// Model-internal reasoning
    Thinking { thinking: String },
    /// Image, audio or video
    Media { kind: MediaKind, source: MediaSource },
    /// Tool invocation
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    /// Tool output. `output` only ever holds text and media blocks.
    ToolResult {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        output: Vec<ContentBlock>,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },
}

impl ContentBlock {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create thinking content
    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking {
            thinking: thinking.into(),
        }
    }

    /// Create media content
    pub fn media(kind: MediaKind, source: MediaSource) -> Self {
        Self::Media { kind, source }
    }

    /// Build a media block from a wire-level file reference.
    ///
    /// The kind comes from the MIME type's primary component, inline data
    /// must be valid base64, and exactly one of `data` and `url` is set.
    pub fn media_from_wire(
        mime_type: Option<&str>,
        data: Option<String>,
        url: Option<String>,
    ) -> Result<Self> {
        let mime_type = mime_type
            .ok_or_else(|| Error::InvalidMediaSource("missing mime type".into()))?;
        let kind = MediaKind::from_mime_type(mime_type).ok_or_else(|| {
            Error::InvalidMediaSource(format!("unsupported mime type {mime_type}"))
        })?;
        if let Some(data) = &data {
            STANDARD.decode(data).map_err(|e| {
                Error::InvalidMediaSource(format!("malformed base64 payload: {e}"))
            })?;
        }
        let source = MediaSource::try_new(data, url, Some(mime_type.to_string()))?;
        Ok(Self::media(kind, source))
    }

    /// Create a tool invocation
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Map<String, Value>) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool result. Blocks other than text and media are dropped
    /// from `output`.
    pub fn tool_result(
        id: impl Into<String>,
        name: Option<String>,
        output: Vec<ContentBlock>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self::ToolResult {
            id: id.into(),
            name,
            output: output
                .into_iter()
                .filter(ContentBlock::is_result_output)
                .collect(),
            metadata,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Whether this block may appear inside a tool result's output
    pub fn is_result_output(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::Media { .. })
    }

    /// Newline-joined text of a tool result's output, `None` when empty or
    /// when this is not a tool result.
    pub fn result_text(&self) -> Option<String> {
        match self {
            Self::ToolResult { output, .. } => {
                let text = output
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() { None } else { Some(text) }
            }
            _ => None,
        }
    }
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// A message exchanged with the agent.
///
/// `id` stays the same for every incremental event of one logical unit, so
/// adapters use it as the key for start/content/end framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: id.into(),
            role,
            content,
        }
    }

    /// Create a user message with text content and a fresh id
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(new_message_id(), Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message
    pub fn assistant(id: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self::new(id, Role::Assistant, content)
    }

    /// Create a tool message
    pub fn tool(id: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self::new(id, Role::Tool, content)
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Iterate over the tool results in this message
    pub fn tool_results(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content.iter().filter(|c| c.is_tool_result())
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Generate a message id
pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_source_requires_exactly_one_location() {
        assert!(MediaSource::try_new(None, None, None).is_err());
        assert!(
            MediaSource::try_new(
                Some("aGk=".into()),
                Some("https://x/y.png".into()),
                Some("image/png".into())
            )
            .is_err()
        );
        let inline =
            MediaSource::try_new(Some("aGk=".into()), None, Some("image/png".into())).unwrap();
        assert_eq!(inline, MediaSource::base64("aGk=", "image/png"));
        let url = MediaSource::try_new(None, Some("https://x/y.png".into()), None).unwrap();
        assert_eq!(url.media_type(), None);
    }

    #[test]
    fn test_url_wildcard_media_type_is_dropped() {
        assert_eq!(
            MediaSource::url("https://x/a", Some("image/*".into())),
            MediaSource::url("https://x/a", None)
        );
        let url = MediaSource::try_new(None, Some("https://x/a".into()), Some("audio/*".into()))
            .unwrap();
        assert_eq!(url.media_type(), None);
        let concrete = MediaSource::url("https://x/a.png", Some("image/png".into()));
        assert_eq!(concrete.media_type(), Some("image/png"));
    }

    #[test]
    fn test_media_from_wire() {
        let inline = ContentBlock::media_from_wire(Some("image/png"), Some("aGk=".into()), None)
            .unwrap();
        assert_eq!(
            inline,
            ContentBlock::media(MediaKind::Image, MediaSource::base64("aGk=", "image/png"))
        );

        let wildcard =
            ContentBlock::media_from_wire(Some("video/*"), None, Some("https://x/v".into()))
                .unwrap();
        assert_eq!(
            wildcard,
            ContentBlock::media(MediaKind::Video, MediaSource::url("https://x/v", None))
        );

        for (mime, data, url) in [
            (None, None, Some("https://x/a")),
            (Some("application/pdf"), Some("aGk="), None),
            (Some("image/png"), Some("not base64!"), None),
            (Some("image/png"), None, None),
        ] {
            let err = ContentBlock::media_from_wire(
                mime,
                data.map(str::to_string),
                url.map(str::to_string),
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidMediaSource(_)), "{mime:?}");
        }
    }

    #[test]
    fn test_inline_media_requires_media_type() {
        let err = MediaSource::try_new(Some("aGk=".into()), None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidMediaSource(_)));
    }

    #[test]
    fn test_media_kind_from_mime_type() {
        assert_eq!(MediaKind::from_mime_type("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime_type("Audio/mpeg"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_mime_type("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime_type("application/pdf"), None);
        assert_eq!(MediaKind::from_mime_type(""), None);
    }

    #[test]
    fn test_tool_result_filters_output() {
        let block = ContentBlock::tool_result(
            "t1",
            None,
            vec![
                ContentBlock::text("42"),
                ContentBlock::thinking("hidden"),
                ContentBlock::tool_use("t2", "nested", Map::new()),
            ],
            Map::new(),
        );
        match block {
            ContentBlock::ToolResult { output, .. } => {
                assert_eq!(output, vec![ContentBlock::text("42")]);
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn test_result_text_joins_with_newlines() {
        let block = ContentBlock::tool_result(
            "t1",
            Some("lookup".into()),
            vec![ContentBlock::text("a"), ContentBlock::text("b")],
            Map::new(),
        );
        assert_eq!(block.result_text().as_deref(), Some("a\nb"));

        let empty = ContentBlock::tool_result("t1", None, vec![], Map::new());
        assert_eq!(empty.result_text(), None);
    }

    #[test]
    fn test_content_block_serde_tags() {
        let value = serde_json::to_value(ContentBlock::thinking("hmm")).unwrap();
        assert_eq!(value, json!({"type": "thinking", "thinking": "hmm"}));

        let parsed: ContentBlock = serde_json::from_value(json!({
            "type": "media",
            "kind": "image",
            "source": {"type": "url", "url": "https://x/y.png"}
        }))
        .unwrap();
        assert_eq!(
            parsed,
            ContentBlock::media(MediaKind::Image, MediaSource::url("https://x/y.png", None))
        );
    }

    #[test]
    fn test_message_text_concatenates_text_blocks() {
        let msg = Message::assistant(
            "m1",
            vec![
                ContentBlock::text("Hello, "),
                ContentBlock::thinking("ignored"),
                ContentBlock::text("world"),
            ],
        );
        assert_eq!(msg.text(), "Hello, world");
        assert_eq!(msg.role.as_str(), "assistant");
    }
}
