//! Asynchronous message expectations.

use super::body::OptionalBody;
use super::content_type::ContentType;
use crate::generators::{Generator, Generators};
use crate::matchingrules::{Category, MatchingRule, MatchingRules, PathError};
use std::collections::BTreeMap;

/// Contents plus a metadata map, for non-HTTP interactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub contents: OptionalBody,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub matching_rules: MatchingRules,
    pub generators: Generators,
}

impl Message {
    pub fn new(contents: OptionalBody) -> Self {
        Self {
            contents,
            ..Default::default()
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        let mut message = Self::new(OptionalBody::json(&value));
        message.metadata.insert(
            "contentType".to_string(),
            serde_json::Value::String("application/json".to_string()),
        );
        message
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_rule(
        mut self,
        category: Category,
        key: &str,
        rule: MatchingRule,
    ) -> Result<Self, PathError> {
        self.matching_rules.add_rule(category, key, rule)?;
        Ok(self)
    }

    pub fn with_generator(
        mut self,
        category: Category,
        key: &str,
        generator: Generator,
    ) -> Result<Self, PathError> {
        self.generators.add(category, key, generator)?;
        Ok(self)
    }

    /// Content type from the `contentType` metadata entry, then the contents.
    pub fn content_type(&self) -> Option<ContentType> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("contentType") || k.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, v)| v.as_str())
            .and_then(ContentType::parse)
            .or_else(|| self.contents.content_type())
    }
}
