//! Whole-request, whole-response and message comparison.

use super::body::match_body;
use super::context::MatchingContext;
use super::executor::{match_equality, match_group};
use super::headers::match_headers;
use super::mismatch::{plain_value, Mismatch, MismatchKind};
use super::query::match_query;
use crate::matchingrules::{Category, MatchingRules};
use crate::model::{HttpRequest, HttpResponse, Message};
use serde_json::Value;
use tracing::debug;

/// Knobs for response and message comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Tolerate keys in actual JSON objects that the expectation does not name.
    pub allow_unexpected_keys: bool,
}

pub fn match_method(expected: &str, actual: &str) -> Option<Mismatch> {
    if expected.eq_ignore_ascii_case(actual) {
        None
    } else {
        Some(Mismatch::new(
            MismatchKind::Method,
            "method",
            expected.to_uppercase(),
            actual.to_uppercase(),
            format!(
                "Expected method '{}' but received '{}'",
                expected.to_uppercase(),
                actual.to_uppercase()
            ),
        ))
    }
}

pub fn match_path(expected: &str, actual: &str, rules: &MatchingRules) -> Vec<Mismatch> {
    let expected_value = Value::String(expected.to_string());
    let actual_value = Value::String(actual.to_string());
    let category = rules.rules_for(Category::Path);
    match category.root() {
        Some(group) => match_group(group, false, MismatchKind::Path, "path", &expected_value, &actual_value),
        None if expected == actual => Vec::new(),
        None => vec![Mismatch::new(
            MismatchKind::Path,
            "path",
            expected,
            actual,
            format!("Expected path '{expected}' but received '{actual}'"),
        )],
    }
}

pub fn match_status(expected: u16, actual: u16, rules: &MatchingRules) -> Vec<Mismatch> {
    let expected_value = Value::from(expected);
    let actual_value = Value::from(actual);
    let category = rules.rules_for(Category::Status);
    match category.root() {
        Some(group) => match_group(group, false, MismatchKind::Status, "status", &expected_value, &actual_value),
        None if expected == actual => Vec::new(),
        None => vec![Mismatch::new(
            MismatchKind::Status,
            "status",
            expected.to_string(),
            actual.to_string(),
            format!("Expected status {expected} but received {actual}"),
        )],
    }
}

/// Compare an actual request against an expectation using the expectation's rules.
pub fn match_request(expected: &HttpRequest, actual: &HttpRequest) -> Vec<Mismatch> {
    match_request_with_rules(expected, actual, &expected.matching_rules)
}

/// Compare with an explicit rule set: method, path, query, headers, then body.
pub fn match_request_with_rules(
    expected: &HttpRequest,
    actual: &HttpRequest,
    rules: &MatchingRules,
) -> Vec<Mismatch> {
    debug!(
        "Matching request {} against expectation {}",
        actual.summary(),
        expected.summary()
    );
    let mut mismatches = Vec::new();
    mismatches.extend(match_method(&expected.method, &actual.method));
    mismatches.extend(match_path(&expected.path, &actual.path, rules));
    mismatches.extend(match_query(
        &expected.query,
        &actual.query,
        &rules.rules_for(Category::Query),
    ));
    mismatches.extend(match_headers(
        &expected.headers,
        &actual.headers,
        &rules.rules_for(Category::Header),
    ));

    let body_rules = rules.rules_for(Category::Body);
    let ctx = MatchingContext::new(&body_rules, MismatchKind::Body);
    mismatches.extend(match_body(
        &expected.body,
        expected.content_type(),
        &actual.body,
        actual.content_type(),
        &ctx,
    ));
    mismatches
}

pub fn match_response(expected: &HttpResponse, actual: &HttpResponse) -> Vec<Mismatch> {
    match_response_with_rules(expected, actual, &expected.matching_rules, MatchOptions::default())
}

/// Compare a response: status, headers, then body.
pub fn match_response_with_rules(
    expected: &HttpResponse,
    actual: &HttpResponse,
    rules: &MatchingRules,
    options: MatchOptions,
) -> Vec<Mismatch> {
    let mut mismatches = match_status(expected.status, actual.status, rules);
    mismatches.extend(match_headers(
        &expected.headers,
        &actual.headers,
        &rules.rules_for(Category::Header),
    ));

    let body_rules = rules.rules_for(Category::Body);
    let ctx = MatchingContext::new(&body_rules, MismatchKind::Body)
        .allowing_unexpected_keys(options.allow_unexpected_keys);
    mismatches.extend(match_body(
        &expected.body,
        expected.content_type(),
        &actual.body,
        actual.content_type(),
        &ctx,
    ));
    mismatches
}

pub fn match_message(expected: &Message, actual: &Message) -> Vec<Mismatch> {
    match_message_with_rules(expected, actual, &expected.matching_rules, MatchOptions::default())
}

/// Compare message contents, then each expected metadata entry.
pub fn match_message_with_rules(
    expected: &Message,
    actual: &Message,
    rules: &MatchingRules,
    options: MatchOptions,
) -> Vec<Mismatch> {
    let body_rules = rules.rules_for(Category::Body);
    let ctx = MatchingContext::new(&body_rules, MismatchKind::Body)
        .allowing_unexpected_keys(options.allow_unexpected_keys);
    let mut mismatches = match_body(
        &expected.contents,
        expected.content_type(),
        &actual.contents,
        actual.content_type(),
        &ctx,
    );

    let metadata_rules = rules.rules_for(Category::Metadata);
    for (key, expected_value) in &expected.metadata {
        match actual.metadata.get(key) {
            None => mismatches.push(Mismatch::new(
                MismatchKind::Metadata,
                key.as_str(),
                plain_value(expected_value),
                "",
                format!("Expected metadata key '{key}' but was missing"),
            )),
            Some(actual_value) => match metadata_rules.for_name(key) {
                Some(group) => mismatches.extend(match_group(
                    group,
                    false,
                    MismatchKind::Metadata,
                    key,
                    expected_value,
                    actual_value,
                )),
                None => mismatches.extend(match_equality(
                    MismatchKind::Metadata,
                    key,
                    expected_value,
                    actual_value,
                )),
            },
        }
    }
    mismatches
}
