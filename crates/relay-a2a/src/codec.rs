//! Mapping between content blocks and A2A parts.
//!
//! Block types that A2A has no native part for travel as text or data parts
//! tagged through a small set of reserved metadata keys (`type`, `id`,
//! `name`). Every other metadata key belongs to the caller and passes through
//! untouched. Parsing and serialization never fail: units that cannot be
//! mapped are logged and skipped.

use relay_core::{ContentBlock, MediaKind, MediaSource};
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::{FileContent, Part};

pub const TYPE_KEY: &str = "type";
pub const ID_KEY: &str = "id";
pub const NAME_KEY: &str = "name";

pub const THINKING_TAG: &str = "thinking";
pub const TOOL_USE_TAG: &str = "tool_use";
pub const TOOL_RESULT_TAG: &str = "tool_result";

/// Field of a tool result data part holding the output blocks
pub const OUTPUT_FIELD: &str = "output";

/// Reserved metadata carried alongside a part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalMeta {
    pub type_tag: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
}

impl InternalMeta {
    fn tagged(tag: &str) -> Self {
        Self {
            type_tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    /// Split part metadata into the reserved keys and the caller's passthrough keys
    pub fn split(metadata: &Map<String, Value>) -> (Self, Map<String, Value>) {
        let mut meta = Self::default();
        let mut passthrough = Map::new();
        for (key, value) in metadata {
            match key.as_str() {
                TYPE_KEY => meta.type_tag = value.as_str().map(str::to_string),
                ID_KEY => meta.id = value.as_str().map(str::to_string),
                NAME_KEY => meta.name = value.as_str().map(str::to_string),
                _ => {
                    passthrough.insert(key.clone(), value.clone());
                }
            }
        }
        (meta, passthrough)
    }

    /// Attach the reserved keys on top of passthrough metadata
    pub fn merge_into(self, mut metadata: Map<String, Value>) -> Map<String, Value> {
        if let Some(tag) = self.type_tag {
            metadata.insert(TYPE_KEY.into(), Value::String(tag));
        }
        if let Some(id) = self.id {
            metadata.insert(ID_KEY.into(), Value::String(id));
        }
        if let Some(name) = self.name {
            metadata.insert(NAME_KEY.into(), Value::String(name));
        }
        metadata
    }
}

/// Parse an A2A part into a content block
pub fn parse_part(part: &Part) -> Option<ContentBlock> {
    parse_part_with_metadata(part).map(|(block, _)| block)
}

/// Serialize a content block into an A2A part
pub fn serialize_block(block: &ContentBlock) -> Option<Part> {
    serialize_block_with_metadata(block, Map::new())
}

/// Parse an A2A part, returning the block and the caller metadata that is not
/// part of the reserved key set.
///
/// For tool results the caller metadata is stored on the block itself and the
/// returned map is empty.
pub fn parse_part_with_metadata(part: &Part) -> Option<(ContentBlock, Map<String, Value>)> {
    let (meta, passthrough) = InternalMeta::split(part.metadata());
    match part {
        Part::Text { text, .. } => match meta.type_tag.as_deref() {
            None => Some((ContentBlock::text(text.clone()), passthrough)),
            Some(THINKING_TAG) => Some((ContentBlock::thinking(text.clone()), passthrough)),
            Some(other) => {
                warn!(type_tag = other, "dropping text part with unsupported type tag");
                None
            }
        },
        Part::File { file, .. } => parse_file(file).map(|block| (block, passthrough)),
        Part::Data { data, .. } => parse_data(data, meta, passthrough),
    }
}

/// Serialize a content block, attaching `metadata` as passthrough metadata
pub fn serialize_block_with_metadata(
    block: &ContentBlock,
    metadata: Map<String, Value>,
) -> Option<Part> {
    match block {
        ContentBlock::Text { text } => Some(Part::Text {
            text: text.clone(),
            metadata,
        }),
        ContentBlock::Thinking { thinking } => Some(Part::Text {
            text: thinking.clone(),
            metadata: InternalMeta::tagged(THINKING_TAG).merge_into(metadata),
        }),
        ContentBlock::Media { kind, source } => Some(Part::File {
            file: serialize_media(*kind, source),
            metadata,
        }),
        ContentBlock::ToolUse { id, name, input } => Some(Part::Data {
            data: input.clone(),
            metadata: InternalMeta {
                type_tag: Some(TOOL_USE_TAG.into()),
                id: Some(id.clone()),
                name: Some(name.clone()),
            }
            .merge_into(metadata),
        }),
        ContentBlock::ToolResult {
            id,
            name,
            output,
            metadata: block_metadata,
        } => {
            let output = match serde_json::to_value(output) {
                Ok(value) => value,
                Err(e) => {
                    warn!(tool_call_id = %id, error = %e, "failed to serialize tool result output");
                    return None;
                }
            };
            let mut data = Map::new();
            data.insert(OUTPUT_FIELD.into(), output);

            let mut merged = block_metadata.clone();
            merged.extend(metadata);
            Some(Part::Data {
                data,
                metadata: InternalMeta {
                    type_tag: Some(TOOL_RESULT_TAG.into()),
                    id: Some(id.clone()),
                    name: name.clone(),
                }
                .merge_into(merged),
            })
        }
    }
}

/// Parse every part, skipping the ones that cannot be mapped
pub fn parse_parts(parts: &[Part]) -> Vec<ContentBlock> {
    parts.iter().filter_map(parse_part).collect()
}

/// Serialize every block, skipping the ones that cannot be mapped
pub fn serialize_blocks<'a>(blocks: impl IntoIterator<Item = &'a ContentBlock>) -> Vec<Part> {
    blocks.into_iter().filter_map(serialize_block).collect()
}

fn parse_file(file: &FileContent) -> Option<ContentBlock> {
    match ContentBlock::media_from_wire(
        file.mime_type.as_deref(),
        file.bytes.clone(),
        file.uri.clone(),
    ) {
        Ok(block) => Some(block),
        Err(e) => {
            warn!(error = %e, "dropping file part");
            None
        }
    }
}

fn serialize_media(kind: MediaKind, source: &MediaSource) -> FileContent {
    match source {
        MediaSource::Base64 { data, media_type } => FileContent {
            bytes: Some(data.clone()),
            mime_type: Some(media_type.clone()),
            ..Default::default()
        },
        MediaSource::Url { url, media_type } => FileContent {
            uri: Some(url.clone()),
            mime_type: Some(
                media_type
                    .clone()
                    .unwrap_or_else(|| kind.wildcard_mime_type()),
            ),
            ..Default::default()
        },
    }
}

fn parse_data(
    data: &Map<String, Value>,
    meta: InternalMeta,
    passthrough: Map<String, Value>,
) -> Option<(ContentBlock, Map<String, Value>)> {
    match meta.type_tag.as_deref() {
        None => {
            let text = Value::Object(data.clone()).to_string();
            Some((ContentBlock::text(text), passthrough))
        }
        Some(TOOL_USE_TAG) => {
            let (Some(id), Some(name)) = (meta.id, meta.name) else {
                warn!("dropping tool_use part without id or name");
                return None;
            };
            Some((ContentBlock::tool_use(id, name, data.clone()), passthrough))
        }
        Some(TOOL_RESULT_TAG) => {
            let Some(id) = meta.id else {
                warn!("dropping tool_result part without id");
                return None;
            };
            let output = parse_output(data.get(OUTPUT_FIELD));
            let block = ContentBlock::tool_result(id, meta.name, output, passthrough);
            Some((block, Map::new()))
        }
        Some(other) => {
            warn!(type_tag = other, "dropping data part with unsupported type tag");
            None
        }
    }
}

/// Tool output is either a plain string or a list of content blocks
fn parse_output(output: Option<&Value>) -> Vec<ContentBlock> {
    match output {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![ContentBlock::text(text.clone())],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value::<ContentBlock>(item.clone()) {
                Ok(block) if block.is_result_output() => Some(block),
                Ok(_) => {
                    warn!("dropping tool output block that is neither text nor media");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed tool output block");
                    None
                }
            })
            .collect(),
        Some(other) => vec![ContentBlock::text(other.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn round_trip(block: ContentBlock) {
        let part = serialize_block(&block).expect("serializes");
        assert_eq!(parse_part(&part), Some(block));
    }

    #[test]
    fn test_round_trip_every_variant() {
        round_trip(ContentBlock::text("hello"));
        round_trip(ContentBlock::thinking("let me think"));
        round_trip(ContentBlock::media(
            MediaKind::Image,
            MediaSource::base64("aGVsbG8=", "image/png"),
        ));
        round_trip(ContentBlock::media(
            MediaKind::Audio,
            MediaSource::url("https://x/a.mp3", Some("audio/mpeg".into())),
        ));
        round_trip(ContentBlock::media(
            MediaKind::Video,
            MediaSource::url("https://x/v", None),
        ));
        round_trip(ContentBlock::media(
            MediaKind::Image,
            MediaSource::url("https://x/a", Some("image/*".into())),
        ));
        round_trip(ContentBlock::tool_use(
            "t1",
            "lookup",
            map(json!({"query": "rust", "limit": 3})),
        ));
        round_trip(ContentBlock::tool_result(
            "t1",
            Some("lookup".into()),
            vec![
                ContentBlock::text("42"),
                ContentBlock::media(MediaKind::Image, MediaSource::base64("aGk=", "image/gif")),
            ],
            map(json!({"latency_ms": 12})),
        ));
    }

    #[test]
    fn test_passthrough_metadata_survives_both_directions() {
        let extra = map(json!({"trace": "abc", "lang": "en"}));
        let part =
            serialize_block_with_metadata(&ContentBlock::thinking("hmm"), extra.clone()).unwrap();
        assert_eq!(part.metadata()["type"], "thinking");
        assert_eq!(part.metadata()["trace"], "abc");

        let (block, passthrough) = parse_part_with_metadata(&part).unwrap();
        assert_eq!(block, ContentBlock::thinking("hmm"));
        assert_eq!(passthrough, extra);
    }

    #[test]
    fn test_tool_use_reads_id_and_name_from_metadata() {
        let part = Part::Data {
            data: map(json!({"city": "Oslo"})),
            metadata: map(json!({"type": "tool_use", "id": "call_1", "name": "weather"})),
        };
        assert_eq!(
            parse_part(&part),
            Some(ContentBlock::tool_use("call_1", "weather", map(json!({"city": "Oslo"}))))
        );
    }

    #[test]
    fn test_tool_use_without_id_is_dropped() {
        let part = Part::Data {
            data: Map::new(),
            metadata: map(json!({"type": "tool_use", "name": "weather"})),
        };
        assert_eq!(parse_part(&part), None);
    }

    #[test]
    fn test_tool_result_accepts_string_output() {
        let part = Part::Data {
            data: map(json!({"output": "42"})),
            metadata: map(json!({"type": "tool_result", "id": "t1", "name": "lookup", "trace": "x"})),
        };
        assert_eq!(
            parse_part(&part),
            Some(ContentBlock::tool_result(
                "t1",
                Some("lookup".into()),
                vec![ContentBlock::text("42")],
                map(json!({"trace": "x"})),
            ))
        );
    }

    #[test]
    fn test_untagged_data_part_becomes_text() {
        let part = Part::Data {
            data: map(json!({"answer": 42})),
            metadata: Map::new(),
        };
        assert_eq!(parse_part(&part), Some(ContentBlock::text(r#"{"answer":42}"#)));
    }

    #[test]
    fn test_unsupported_file_parts_are_dropped() {
        let pdf = Part::File {
            file: FileContent {
                uri: Some("https://x/doc.pdf".into()),
                mime_type: Some("application/pdf".into()),
                ..Default::default()
            },
            metadata: Map::new(),
        };
        assert_eq!(parse_part(&pdf), None);

        let bad_base64 = Part::File {
            file: FileContent {
                bytes: Some("not base64!!".into()),
                mime_type: Some("image/png".into()),
                ..Default::default()
            },
            metadata: Map::new(),
        };
        assert_eq!(parse_part(&bad_base64), None);

        let both = Part::File {
            file: FileContent {
                bytes: Some("aGk=".into()),
                uri: Some("https://x/a.png".into()),
                mime_type: Some("image/png".into()),
                ..Default::default()
            },
            metadata: Map::new(),
        };
        assert_eq!(parse_part(&both), None);
    }

    #[test]
    fn test_unknown_type_tag_is_dropped() {
        let part = Part::Text {
            text: "x".into(),
            metadata: map(json!({"type": "mystery"})),
        };
        assert_eq!(parse_part(&part), None);
    }

    #[test]
    fn test_parse_parts_skips_unsupported() {
        let parts = vec![
            Part::text("a"),
            Part::Text {
                text: "b".into(),
                metadata: map(json!({"type": "mystery"})),
            },
            Part::text("c"),
        ];
        assert_eq!(
            parse_parts(&parts),
            vec![ContentBlock::text("a"), ContentBlock::text("c")]
        );
    }
}
