//! Matcher engine: compares an expected request, response or message against
//! an actual one under a set of matching rules.
//!
//! Every failed check appends one [`Mismatch`] and the walk carries on, so a
//! single pass reports everything that differs. Mismatches come out in the
//! traversal order of the expected tree.
//!
//! ## Module Structure
//!
//! - `mismatch`: the `Mismatch` record and its kinds
//! - `executor`: single-rule and rule-group evaluation
//! - `context`: rule lookup while walking a tree
//! - `json`: lock-step JSON walk (objects, arrays, scalars)
//! - `body`: content-type dispatch for bodies
//! - `headers`: header comparison
//! - `query`: query parameter comparison
//! - `request`: requests, responses and messages

mod body;
mod context;
mod executor;
mod headers;
mod json;
mod mismatch;
mod query;
mod request;


pub use body::match_body;
pub use context::MatchingContext;
pub use headers::match_headers;
pub use json::match_json;
pub use mismatch::{Mismatch, MismatchKind};
pub use query::match_query;
#[allow(unused_imports)]
pub use request::{
    match_message, match_message_with_rules, match_method, match_path, match_request,
    match_request_with_rules, match_response, match_response_with_rules, match_status,
    MatchOptions,
};
