use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Image dimension used when a client omits width or height (or sends 0).
pub const DEFAULT_IMAGE_DIMENSION: i64 = 64;

pub const TEXT_TYPE: &str = "text";
pub const IMAGE_TYPE: &str = "image";
pub const VIDEO_TYPE: &str = "video";

/// Typed message payload. Exactly one shape per message; the `type` tag on
/// the wire selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        url: String,
        width: i64,
        height: i64,
    },
    Video {
        url: String,
        /// Video source name, e.g. "youtube". Resolved against the
        /// video source registry on write.
        source: String,
    },
}

impl Content {
    /// Name of the message type this variant is registered under.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => TEXT_TYPE,
            Self::Image { .. } => IMAGE_TYPE,
            Self::Video { .. } => VIDEO_TYPE,
        }
    }
}

/// Loose content fields as sent by clients. Only the fields belonging to the
/// declared `type` are used; the rest are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentFields {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("unsupported content type: {0:?}")]
    UnsupportedContentType(String),

    #[error("unknown video source: {0:?}")]
    UnknownVideoSource(String),
}

impl TryFrom<ContentFields> for Content {
    type Error = ContentError;

    fn try_from(fields: ContentFields) -> Result<Self, Self::Error> {
        match fields.kind.as_str() {
            TEXT_TYPE => Ok(Self::Text {
                text: fields.text.unwrap_or_default(),
            }),
            IMAGE_TYPE => Ok(Self::Image {
                url: fields.url.unwrap_or_default(),
                width: dimension_or_default(fields.width),
                height: dimension_or_default(fields.height),
            }),
            VIDEO_TYPE => match fields.source {
                Some(source) if !source.is_empty() => Ok(Self::Video {
                    url: fields.url.unwrap_or_default(),
                    source,
                }),
                other => Err(ContentError::UnknownVideoSource(other.unwrap_or_default())),
            },
            _ => Err(ContentError::UnsupportedContentType(fields.kind)),
        }
    }
}

// Negative or oversized dimensions are stored as given.
fn dimension_or_default(value: Option<i64>) -> i64 {
    match value {
        None | Some(0) => DEFAULT_IMAGE_DIMENSION,
        Some(v) => v,
    }
}

/// A message as handed back to readers: envelope fields plus its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: i64,
    pub recipient: i64,
    pub timestamp: DateTime<Utc>,
    pub content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<Content, ContentError> {
        let fields: ContentFields = serde_json::from_value(value).unwrap();
        Content::try_from(fields)
    }

    #[test]
    fn text_content() {
        let content = parse(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(content, Content::Text { text: "hi".into() });
        assert_eq!(content.type_name(), "text");
    }

    #[test]
    fn image_dimensions_default_when_missing_or_zero() {
        let content = parse(json!({"type": "image", "url": "http://x/y.png"})).unwrap();
        assert_eq!(
            content,
            Content::Image { url: "http://x/y.png".into(), width: 64, height: 64 }
        );

        let content = parse(json!({"type": "image", "url": "u", "width": 0, "height": 300})).unwrap();
        assert_eq!(content, Content::Image { url: "u".into(), width: 64, height: 300 });
    }

    #[test]
    fn image_dimensions_are_not_validated() {
        let content = parse(json!({"type": "image", "url": "u", "width": -5, "height": 100000})).unwrap();
        assert_eq!(content, Content::Image { url: "u".into(), width: -5, height: 100000 });
    }

    #[test]
    fn video_requires_source() {
        let err = parse(json!({"type": "video", "url": "u"})).unwrap_err();
        assert_eq!(err, ContentError::UnknownVideoSource(String::new()));

        let err = parse(json!({"type": "video", "url": "u", "source": ""})).unwrap_err();
        assert!(matches!(err, ContentError::UnknownVideoSource(_)));

        let content = parse(json!({"type": "video", "url": "u", "source": "youtube"})).unwrap();
        assert_eq!(content.type_name(), "video");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse(json!({"type": "sticker"})).unwrap_err();
        assert_eq!(err, ContentError::UnsupportedContentType("sticker".into()));
    }

    #[test]
    fn fields_of_other_shapes_are_ignored() {
        let content = parse(json!({"type": "text", "text": "hi", "width": 10, "source": "youtube"})).unwrap();
        assert_eq!(content, Content::Text { text: "hi".into() });
    }

    #[test]
    fn content_serializes_with_type_tag() {
        let value = serde_json::to_value(Content::Video {
            url: "https://youtu.be/x".into(),
            source: "youtube".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "video", "url": "https://youtu.be/x", "source": "youtube"})
        );
    }
}
