//! Mismatch records produced by the matcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What part of the interaction a mismatch was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MismatchKind {
    Method,
    Path,
    Query,
    Header,
    Body,
    BodyType,
    Status,
    Metadata,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MismatchKind::Method => "method",
            MismatchKind::Path => "path",
            MismatchKind::Query => "query",
            MismatchKind::Header => "header",
            MismatchKind::Body => "body",
            MismatchKind::BodyType => "body type",
            MismatchKind::Status => "status",
            MismatchKind::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// One disagreement between an expected and an actual value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub path: String,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl Mismatch {
    pub fn new(
        kind: MismatchKind,
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path, self.message)
    }
}

/// Render a JSON value for messages: strings quoted with single quotes, the rest as JSON.
pub(crate) fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

/// Plain form for the `expected`/`actual` fields.
pub(crate) fn plain_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
