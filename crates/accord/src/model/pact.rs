//! The pact document.

use super::interaction::{HttpInteraction, Interaction, MessageInteraction};
use crate::generators::GeneratorError;
use crate::matchingrules::{MatchingRuleError, PathError};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Pact specification version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PactSpecVersion {
    V1,
    V1_1,
    V2,
    #[default]
    V3,
    V4,
}

impl PactSpecVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PactSpecVersion::V1 => "1.0.0",
            PactSpecVersion::V1_1 => "1.1.0",
            PactSpecVersion::V2 => "2.0.0",
            PactSpecVersion::V3 => "3.0.0",
            PactSpecVersion::V4 => "4.0",
        }
    }

    /// Parse `"3.0.0"`, `"v3"`, `"4.0"` and similar.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().trim_start_matches(['v', 'V']);
        let mut parts = v.split('.');
        let major = parts.next()?.parse::<u32>().ok()?;
        let minor = parts.next().and_then(|m| m.parse::<u32>().ok()).unwrap_or(0);
        match (major, minor) {
            (1, 0) => Some(PactSpecVersion::V1),
            (1, _) => Some(PactSpecVersion::V1_1),
            (2, _) => Some(PactSpecVersion::V2),
            (3, _) => Some(PactSpecVersion::V3),
            (4, _) => Some(PactSpecVersion::V4),
            _ => None,
        }
    }
}

impl fmt::Display for PactSpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors loading, saving or combining pacts.
#[derive(Debug, Error)]
pub enum PactError {
    #[error("Cannot merge pacts for different parties: {0}")]
    Incompatible(String),
    #[error("Invalid pact document: {0}")]
    InvalidDocument(String),
    #[error("Invalid matching rule: {0}")]
    MatchingRule(#[from] MatchingRuleError),
    #[error("Invalid generator: {0}")]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A contract between one consumer and one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Pact {
    pub consumer: String,
    pub provider: String,
    pub interactions: Vec<Interaction>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub spec_version: PactSpecVersion,
}

impl Pact {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            interactions: Vec::new(),
            metadata: BTreeMap::new(),
            spec_version: PactSpecVersion::default(),
        }
    }

    pub fn with_interaction(mut self, interaction: impl Into<Interaction>) -> Self {
        self.interactions.push(interaction.into());
        self
    }

    pub fn with_spec_version(mut self, version: PactSpecVersion) -> Self {
        self.spec_version = version;
        self
    }

    /// Append interactions that are not already present, keeping the order in
    /// which each distinct interaction was first seen. Returns how many were added.
    pub fn merge<I>(&mut self, interactions: I) -> usize
    where
        I: IntoIterator<Item = Interaction>,
    {
        let mut added = 0;
        for interaction in interactions {
            if !self.interactions.contains(&interaction) {
                self.interactions.push(interaction);
                added += 1;
            }
        }
        added
    }

    /// Merge another pact for the same consumer and provider.
    pub fn merge_pact(&mut self, other: &Pact) -> Result<usize, PactError> {
        if self.consumer != other.consumer || self.provider != other.provider {
            return Err(PactError::Incompatible(format!(
                "{} -> {} vs {} -> {}",
                self.consumer, self.provider, other.consumer, other.provider
            )));
        }
        if other.spec_version > self.spec_version {
            self.spec_version = other.spec_version;
        }
        Ok(self.merge(other.interactions.iter().cloned()))
    }

    pub fn http_interactions(&self) -> impl Iterator<Item = &HttpInteraction> {
        self.interactions.iter().filter_map(Interaction::as_http)
    }

    pub fn message_interactions(&self) -> impl Iterator<Item = &MessageInteraction> {
        self.interactions.iter().filter_map(Interaction::as_message)
    }
}
