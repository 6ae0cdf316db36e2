//! HTTP request and response shapes shared by expectations and live traffic.

use super::body::OptionalBody;
use super::content_type::ContentType;
use super::multimap::MultiValueMap;
use crate::generators::{Generator, Generators};
use crate::matchingrules::{Category, MatchingRule, MatchingRules, PathError};

/// An expected or actual HTTP request.
///
/// Expected requests carry the matching rules and generators for the request side
/// of an interaction; actual requests leave them empty.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: MultiValueMap,
    pub headers: MultiValueMap,
    pub body: OptionalBody,
    pub matching_rules: MatchingRules,
    pub generators: Generators,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            query: MultiValueMap::new(),
            headers: MultiValueMap::new(),
            body: OptionalBody::Missing,
            matching_rules: MatchingRules::default(),
            generators: Generators::default(),
        }
    }
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: OptionalBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_json_body(self, value: serde_json::Value) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(OptionalBody::json(&value))
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

    /// Content type from the `Content-Type` header, then the body.
    pub fn content_type(&self) -> Option<ContentType> {
        self.headers
            .first_ignore_case("content-type")
            .and_then(ContentType::parse)
            .or_else(|| self.body.content_type())
    }

    /// `METHOD /path?query`, for logs and reports.
    pub fn summary(&self) -> String {
        if self.query.is_empty() {
            format!("{} {}", self.method, self.path)
        } else {
            format!("{} {}?{}", self.method, self.path, self.query.to_query_string())
        }
    }
}

/// An expected or actual HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: MultiValueMap,
    pub body: OptionalBody,
    pub matching_rules: MatchingRules,
    pub generators: Generators,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: MultiValueMap::new(),
            body: OptionalBody::Missing,
            matching_rules: MatchingRules::default(),
            generators: Generators::default(),
        }
    }
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: OptionalBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_json_body(self, value: serde_json::Value) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(OptionalBody::json(&value))
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

    pub fn content_type(&self) -> Option<ContentType> {
        self.headers
            .first_ignore_case("content-type")
            .and_then(ContentType::parse)
            .or_else(|| self.body.content_type())
    }
}
