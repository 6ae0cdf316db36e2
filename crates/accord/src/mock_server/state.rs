//! Session bookkeeping for a running mock server.
//!
//! Every request is matched and recorded under one lock, so concurrent
//! requests can never both claim the same interaction.

use crate::matching::{match_request, Mismatch, MismatchKind};
use crate::model::{HttpRequest, HttpResponse};
use crate::verification::{
    FailureCause, InteractionMismatch, MissingInteraction, MockServerState, RequestSummary,
    VerificationResult,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// An interaction the session expects, with generators already applied.
#[derive(Debug, Clone)]
pub struct ExpectedInteraction {
    pub description: String,
    pub request: HttpRequest,
    pub response: HttpResponse,
}

/// What the handler should answer with.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(Box<HttpResponse>),
    Mismatched {
        description: String,
        mismatches: Vec<Mismatch>,
    },
    Unexpected,
}

#[derive(Debug)]
struct Slot {
    interaction: ExpectedInteraction,
    fulfilled: bool,
}

#[derive(Debug, Default)]
struct Session {
    slots: Vec<Slot>,
    unexpected: Vec<RequestSummary>,
    mismatched: Vec<InteractionMismatch>,
    aborted: Vec<RequestSummary>,
}

#[derive(Debug)]
pub struct SessionState {
    session: Mutex<Session>,
    in_flight: AtomicUsize,
}

impl SessionState {
    pub fn new(interactions: Vec<ExpectedInteraction>) -> Self {
        let slots = interactions
            .into_iter()
            .map(|interaction| Slot {
                interaction,
                fulfilled: false,
            })
            .collect();
        Self {
            session: Mutex::new(Session {
                slots,
                ..Default::default()
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Count a request as in flight until the guard completes or is dropped.
    pub fn begin(self: &Arc<Self>, request: RequestSummary) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: Arc::clone(self),
            request: Some(request),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Match `request` against the unfulfilled interactions and record the outcome.
    ///
    /// An exact match is served, earliest declared first. Otherwise the
    /// request is mismatched against the candidate with the same method and
    /// path that has the fewest mismatches, earliest declared on a tie. With
    /// no candidate on the same method and path the request is unexpected.
    pub fn handle(&self, request: &HttpRequest) -> MatchOutcome {
        let mut session = self.session.lock();
        let summary = RequestSummary::from_request(request);

        let candidates: Vec<(usize, Vec<Mismatch>)> = session
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.fulfilled)
            .map(|(index, slot)| (index, match_request(&slot.interaction.request, request)))
            .collect();

        if let Some(&(index, _)) = candidates.iter().find(|(_, m)| m.is_empty()) {
            let slot = &mut session.slots[index];
            slot.fulfilled = true;
            debug!("Request {} matched '{}'", summary, slot.interaction.description);
            return MatchOutcome::Matched(Box::new(slot.interaction.response.clone()));
        }

        let best = candidates
            .into_iter()
            .filter(|(_, mismatches)| {
                !mismatches
                    .iter()
                    .any(|m| matches!(m.kind, MismatchKind::Method | MismatchKind::Path))
            })
            .min_by_key(|(index, mismatches)| (mismatches.len(), *index));

        let Some((index, mismatches)) = best else {
            warn!("Unexpected request {}", summary);
            session.unexpected.push(summary);
            return MatchOutcome::Unexpected;
        };

        let description = session.slots[index].interaction.description.clone();
        warn!(
            "Request {} does not match '{}': {} mismatch(es)",
            summary,
            description,
            mismatches.len()
        );
        session.mismatched.push(InteractionMismatch {
            description: description.clone(),
            request: summary,
            mismatches: mismatches.clone(),
        });
        MatchOutcome::Mismatched {
            description,
            mismatches,
        }
    }

    fn record_aborted(&self, request: RequestSummary) {
        warn!("Request {} was aborted before it completed", request);
        self.session.lock().aborted.push(request);
    }

    pub fn snapshot(&self) -> MockServerState {
        let session = self.session.lock();
        MockServerState {
            missing: session
                .slots
                .iter()
                .filter(|slot| !slot.fulfilled)
                .map(|slot| MissingInteraction {
                    description: slot.interaction.description.clone(),
                    method: slot.interaction.request.method.clone(),
                    path: slot.interaction.request.path.clone(),
                })
                .collect(),
            unexpected: session.unexpected.clone(),
            mismatched: session.mismatched.clone(),
            aborted: session.aborted.clone(),
        }
    }

    /// The session verdict: `Ok` only when every interaction was served and
    /// nothing else was seen.
    pub fn verdict(&self) -> VerificationResult {
        let state = self.snapshot();
        if state.is_clean() {
            VerificationResult::Ok
        } else {
            VerificationResult::Error {
                cause: FailureCause::ContractViolation,
                mock_server_state: Some(state),
            }
        }
    }
}

/// Marks one request as in flight. Dropping it without `complete` records
/// the request as aborted.
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<SessionState>,
    request: Option<RequestSummary>,
}

impl InFlightGuard {
    pub fn complete(mut self) {
        self.request = None;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(request) = self.request.take() {
            self.state.record_aborted(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchingrules::{Category, MatchingRule};

    fn expected(description: &str, request: HttpRequest) -> ExpectedInteraction {
        ExpectedInteraction {
            description: description.to_string(),
            request,
            response: HttpResponse::new(200),
        }
    }

    #[test]
    fn test_each_interaction_is_served_once() {
        let state = SessionState::new(vec![expected("get", HttpRequest::new("GET", "/a"))]);
        assert!(matches!(
            state.handle(&HttpRequest::new("GET", "/a")),
            MatchOutcome::Matched(_)
        ));
        assert!(matches!(
            state.handle(&HttpRequest::new("GET", "/a")),
            MatchOutcome::Unexpected
        ));
        let snapshot = state.snapshot();
        assert!(snapshot.missing.is_empty());
        assert_eq!(snapshot.unexpected.len(), 1);
    }

    #[test]
    fn test_identical_interactions_are_consumed_in_order() {
        let state = SessionState::new(vec![
            expected("first", HttpRequest::new("GET", "/a")),
            expected("second", HttpRequest::new("GET", "/a")),
        ]);
        state.handle(&HttpRequest::new("GET", "/a"));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.missing.len(), 1);
        assert_eq!(snapshot.missing[0].description, "second");
    }

    #[test]
    fn test_close_request_is_recorded_as_mismatched() {
        let request = HttpRequest::new("GET", "/search").with_query("q", "shoes");
        let state = SessionState::new(vec![expected("search", request)]);

        let outcome = state.handle(&HttpRequest::new("GET", "/search").with_query("q", "hats"));
        match outcome {
            MatchOutcome::Mismatched {
                description,
                mismatches,
            } => {
                assert_eq!(description, "search");
                assert_eq!(mismatches[0].kind, MismatchKind::Query);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let verdict = state.verdict();
        let snapshot = verdict.mock_server_state().unwrap();
        assert_eq!(snapshot.mismatched.len(), 1);
        assert_eq!(snapshot.missing.len(), 1);
        assert_eq!(verdict.cause(), Some(&FailureCause::ContractViolation));
    }

    #[test]
    fn test_wrong_path_is_unexpected() {
        let state = SessionState::new(vec![expected("get", HttpRequest::new("GET", "/a"))]);
        assert!(matches!(
            state.handle(&HttpRequest::new("GET", "/b")),
            MatchOutcome::Unexpected
        ));
        assert!(state.snapshot().mismatched.is_empty());
    }

    #[test]
    fn test_best_candidate_wins() {
        let loose = HttpRequest::new("GET", "/items")
            .with_query("page", "1")
            .with_query("size", "10");
        let close = HttpRequest::new("GET", "/items")
            .with_query("page", "2")
            .with_rule(Category::Query, "size", MatchingRule::Regex("\\d+".into()))
            .unwrap()
            .with_query("size", "10");
        let state = SessionState::new(vec![expected("loose", loose), expected("close", close)]);

        let actual = HttpRequest::new("GET", "/items")
            .with_query("page", "2")
            .with_query("size", "25");
        assert!(matches!(state.handle(&actual), MatchOutcome::Matched(_)));
        assert_eq!(state.snapshot().missing[0].description, "loose");
    }

    #[test]
    fn test_same_route_candidate_beats_closer_foreign_route() {
        let create = HttpRequest::new("POST", "/orders").with_json_body(serde_json::json!({
            "sku": "A-1", "quantity": 2, "currency": "EUR", "express": false
        }));
        let state = SessionState::new(vec![
            expected("create", create),
            expected("ping", HttpRequest::new("GET", "/ping")),
        ]);

        let actual = HttpRequest::new("POST", "/orders").with_json_body(serde_json::json!({
            "sku": "B-9", "quantity": 5, "currency": "USD", "express": true
        }));
        match state.handle(&actual) {
            MatchOutcome::Mismatched {
                description,
                mismatches,
            } => {
                assert_eq!(description, "create");
                assert_eq!(mismatches.len(), 4);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let snapshot = state.snapshot();
        assert_eq!(snapshot.mismatched.len(), 1);
        assert!(snapshot.unexpected.is_empty());
    }

    #[test]
    fn test_equal_mismatch_counts_go_to_earliest_declared() {
        let state = SessionState::new(vec![
            expected("first", HttpRequest::new("GET", "/items").with_query("page", "1")),
            expected("second", HttpRequest::new("GET", "/items").with_query("page", "2")),
        ]);

        let outcome = state.handle(&HttpRequest::new("GET", "/items").with_query("page", "3"));
        assert!(matches!(
            outcome,
            MatchOutcome::Mismatched { ref description, ref mismatches }
                if description == "first" && mismatches.len() == 1
        ));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.mismatched[0].description, "first");
        let missing: Vec<_> = snapshot.missing.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(missing, vec!["first", "second"]);
    }

    #[test]
    fn test_dropped_guard_records_abort() {
        let state = Arc::new(SessionState::new(Vec::new()));
        let guard = state.begin(RequestSummary::new("POST", "/upload", None));
        assert_eq!(state.in_flight(), 1);
        drop(guard);
        assert_eq!(state.in_flight(), 0);
        assert_eq!(state.snapshot().aborted.len(), 1);

        state.begin(RequestSummary::new("GET", "/", None)).complete();
        assert_eq!(state.snapshot().aborted.len(), 1);
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn test_clean_session_is_ok() {
        let state = SessionState::new(vec![expected("get", HttpRequest::new("GET", "/"))]);
        assert!(!state.verdict().is_ok());
        state.handle(&HttpRequest::new("GET", "/"));
        assert!(state.verdict().is_ok());
    }
}
