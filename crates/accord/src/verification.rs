//! Verdicts shared by mock server sessions and provider verification.
//!
//! A `VerificationResult` is data: mismatches and failure causes are carried
//! as values so a report can always be produced, whatever went wrong.

use crate::matching::Mismatch;
use crate::model::HttpRequest;
use serde::Serialize;
use std::fmt;

/// Outcome of a mock server session or of verifying one interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum VerificationResult {
    Ok,
    /// The provider answered, but not the way the contract says.
    #[serde(rename_all = "camelCase")]
    PartialMismatch { mismatches: Vec<Mismatch> },
    #[serde(rename_all = "camelCase")]
    Error {
        cause: FailureCause,
        #[serde(skip_serializing_if = "Option::is_none")]
        mock_server_state: Option<MockServerState>,
    },
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationResult::Ok)
    }

    pub fn error(cause: FailureCause) -> Self {
        VerificationResult::Error {
            cause,
            mock_server_state: None,
        }
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        match self {
            VerificationResult::PartialMismatch { mismatches } => mismatches,
            _ => &[],
        }
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            VerificationResult::Error { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn mock_server_state(&self) -> Option<&MockServerState> {
        match self {
            VerificationResult::Error {
                mock_server_state, ..
            } => mock_server_state.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Ok => f.write_str("OK"),
            VerificationResult::PartialMismatch { mismatches } => {
                write!(f, "{} mismatch(es)", mismatches.len())?;
                for mismatch in mismatches {
                    write!(f, "\n  {mismatch}")?;
                }
                Ok(())
            }
            VerificationResult::Error {
                cause,
                mock_server_state,
            } => {
                write!(f, "{cause}")?;
                if let Some(state) = mock_server_state {
                    write!(f, "\n{state}")?;
                }
                Ok(())
            }
        }
    }
}

/// Why a session or an interaction ended in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "camelCase")]
pub enum FailureCause {
    /// The session saw missing, unexpected, mismatched or aborted requests.
    ContractViolation,
    TestFailed(String),
    /// Timeout in milliseconds.
    TestTimedOut(u64),
    Setup(String),
    Generator(String),
    StateChange(String),
    Transport(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ContractViolation => f.write_str("contract violated"),
            FailureCause::TestFailed(reason) => write!(f, "test failed: {reason}"),
            FailureCause::TestTimedOut(ms) => write!(f, "test timed out after {ms}ms"),
            FailureCause::Setup(reason) => write!(f, "setup failed: {reason}"),
            FailureCause::Generator(reason) => write!(f, "generator failed: {reason}"),
            FailureCause::StateChange(reason) => write!(f, "provider state change failed: {reason}"),
            FailureCause::Transport(reason) => write!(f, "transport error: {reason}"),
        }
    }
}

/// The method, path and query of a request, enough to identify it in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl RequestSummary {
    pub fn new(method: impl Into<String>, path: impl Into<String>, query: Option<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: query.filter(|q| !q.is_empty()),
        }
    }

    pub fn from_request(request: &HttpRequest) -> Self {
        Self::new(
            request.method.clone(),
            request.path.clone(),
            Some(request.query.to_query_string()),
        )
    }
}

impl fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingInteraction {
    pub description: String,
    pub method: String,
    pub path: String,
}

/// A request that came closest to an interaction but did not satisfy it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionMismatch {
    pub description: String,
    pub request: RequestSummary,
    pub mismatches: Vec<Mismatch>,
}

/// Snapshot of what a mock server session saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MockServerState {
    pub missing: Vec<MissingInteraction>,
    pub unexpected: Vec<RequestSummary>,
    pub mismatched: Vec<InteractionMismatch>,
    pub aborted: Vec<RequestSummary>,
}

impl MockServerState {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.mismatched.is_empty()
            && self.aborted.is_empty()
    }
}

impl fmt::Display for MockServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("all expected requests received");
        }
        let mut lines = Vec::new();
        for missing in &self.missing {
            lines.push(format!(
                "missing: '{}' ({} {})",
                missing.description, missing.method, missing.path
            ));
        }
        for request in &self.unexpected {
            lines.push(format!("unexpected: {request}"));
        }
        for mismatch in &self.mismatched {
            lines.push(format!(
                "mismatched: {} against '{}'",
                mismatch.request, mismatch.description
            ));
            for m in &mismatch.mismatches {
                lines.push(format!("    {m}"));
            }
        }
        for request in &self.aborted {
            lines.push(format!("aborted: {request}"));
        }
        f.write_str(&lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MismatchKind;
    use serde_json::json;

    #[test]
    fn test_ok_serializes_as_tag() {
        assert_eq!(
            serde_json::to_value(VerificationResult::Ok).unwrap(),
            json!({"result": "ok"})
        );
    }

    #[test]
    fn test_error_carries_state() {
        let state = MockServerState {
            unexpected: vec![RequestSummary::new("GET", "/nope", Some("a=1".into()))],
            ..Default::default()
        };
        assert!(!state.is_clean());
        let result = VerificationResult::Error {
            cause: FailureCause::ContractViolation,
            mock_server_state: Some(state.clone()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["result"], "error");
        assert_eq!(value["cause"], json!({"type": "contractViolation"}));
        assert_eq!(value["mockServerState"]["unexpected"][0]["query"], "a=1");
        assert_eq!(result.mock_server_state(), Some(&state));
        assert!(result.to_string().contains("unexpected: GET /nope?a=1"));
    }

    #[test]
    fn test_partial_mismatch_display() {
        let result = VerificationResult::PartialMismatch {
            mismatches: vec![Mismatch::new(
                MismatchKind::Status,
                "status",
                "200",
                "500",
                "Expected status 200 but received 500",
            )],
        };
        assert!(!result.is_ok());
        assert_eq!(result.mismatches().len(), 1);
        assert_eq!(
            result.to_string(),
            "1 mismatch(es)\n  [status] status: Expected status 200 but received 500"
        );
    }

    #[test]
    fn test_empty_query_is_dropped() {
        let summary = RequestSummary::from_request(&HttpRequest::new("POST", "/orders"));
        assert_eq!(summary.query, None);
        assert_eq!(summary.to_string(), "POST /orders");
    }
}
