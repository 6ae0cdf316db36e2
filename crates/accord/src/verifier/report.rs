//! Per-interaction outcomes of a provider verification run.

use crate::verification::VerificationResult;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResult {
    pub description: String,
    pub result: VerificationResult,
}

impl InteractionResult {
    pub fn new(description: impl Into<String>, result: VerificationResult) -> Self {
        Self {
            description: description.into(),
            result,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub consumer: String,
    pub provider: String,
    pub results: Vec<InteractionResult>,
    /// Descriptions of interactions left out by the configured filters.
    pub skipped: Vec<String>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(InteractionResult::is_ok)
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
