//! Media type parsing and magic-byte sniffing.

use std::collections::BTreeMap;
use std::fmt;

/// A parsed `type/subtype; param=value` media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub main_type: String,
    pub sub_type: String,
    pub parameters: BTreeMap<String, String>,
}

impl ContentType {
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(';');
        let base = parts.next()?.trim();
        let (main_type, sub_type) = base.split_once('/')?;
        if main_type.is_empty() || sub_type.is_empty() {
            return None;
        }
        let parameters = parts
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| {
                (
                    k.trim().to_ascii_lowercase(),
                    v.trim().trim_matches('"').to_string(),
                )
            })
            .collect();
        Some(Self {
            main_type: main_type.trim().to_ascii_lowercase(),
            sub_type: sub_type.trim().to_ascii_lowercase(),
            parameters,
        })
    }

    /// `type/subtype` without parameters.
    pub fn base_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    pub fn is_json(&self) -> bool {
        self.sub_type == "json" || self.sub_type.ends_with("+json")
    }

    pub fn is_xml(&self) -> bool {
        self.sub_type == "xml" || self.sub_type.ends_with("+xml")
    }

    pub fn is_form_urlencoded(&self) -> bool {
        self.main_type == "application" && self.sub_type == "x-www-form-urlencoded"
    }

    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Media types are equivalent when base types match and parameters match,
    /// ignoring parameter order and the case of `charset`.
    pub fn equivalent(&self, other: &ContentType) -> bool {
        if self.base_type() != other.base_type() || self.parameters.len() != other.parameters.len()
        {
            return false;
        }
        self.parameters.iter().all(|(k, v)| match other.parameters.get(k) {
            Some(o) if k == "charset" => o.eq_ignore_ascii_case(v),
            Some(o) => o == v,
            None => false,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (k, v) in &self.parameters {
            write!(f, ";{k}={v}")?;
        }
        Ok(())
    }
}

/// Guess a media type from the leading bytes of a body.
pub fn detect_content_type(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
    ];
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| bytes.starts_with(sig)) {
        return Some(mime);
    }

    let text = std::str::from_utf8(bytes).ok()?;
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") || (trimmed.starts_with('<') && !trimmed.starts_with("<!")) {
        return Some("application/xml");
    }
    if trimmed.starts_with("<!") {
        return Some("text/html");
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(text).is_ok()
    {
        return Some("application/json");
    }
    Some("text/plain")
}
