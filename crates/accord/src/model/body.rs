//! Request, response and message bodies.

use super::content_type::{detect_content_type, ContentType};
use bytes::Bytes;
use std::borrow::Cow;

/// A body that may be absent, explicitly empty, JSON `null` or present.
///
/// A `Missing` expected body places no constraint on the actual body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionalBody {
    #[default]
    Missing,
    Empty,
    Null,
    Present {
        bytes: Bytes,
        content_type: Option<String>,
    },
}

impl OptionalBody {
    pub fn present(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        OptionalBody::Present {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        OptionalBody::Present {
            bytes: Bytes::from(value.to_string()),
            content_type: Some("application/json".to_string()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        OptionalBody::Present {
            bytes: Bytes::from(text.into()),
            content_type: Some("text/plain".to_string()),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, OptionalBody::Present { .. })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, OptionalBody::Missing)
    }

    /// Raw bytes; empty for anything but `Present`.
    pub fn bytes(&self) -> &[u8] {
        match self {
            OptionalBody::Present { bytes, .. } => bytes,
            OptionalBody::Null => b"null",
            _ => &[],
        }
    }

    /// Declared content type, if the body carries one.
    pub fn declared_content_type(&self) -> Option<&str> {
        match self {
            OptionalBody::Present { content_type, .. } => content_type.as_deref(),
            _ => None,
        }
    }

    /// Declared content type, falling back to sniffing the bytes.
    pub fn content_type(&self) -> Option<ContentType> {
        self.declared_content_type()
            .and_then(ContentType::parse)
            .or_else(|| match self {
                OptionalBody::Present { bytes, .. } => {
                    detect_content_type(bytes).and_then(ContentType::parse)
                }
                _ => None,
            })
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        match self {
            OptionalBody::Present { bytes, .. } => OptionalBody::Present {
                bytes,
                content_type: Some(content_type.into()),
            },
            other => other,
        }
    }

    /// Parse the body as JSON.
    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            OptionalBody::Null => Some(serde_json::Value::Null),
            OptionalBody::Present { bytes, .. } => serde_json::from_slice(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }
}
