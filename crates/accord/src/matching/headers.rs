//! Header comparison: case-insensitive names, index-wise values.

use super::executor::match_group;
use super::mismatch::{Mismatch, MismatchKind};
use crate::matchingrules::{MatchingRuleCategory, RuleGroup};
use crate::model::{ContentType, MultiValueMap};
use serde_json::Value;

/// Headers present in `expected` must be present in `actual`; extra actual
/// headers are ignored unless the category has a `$` wildcard rule.
pub fn match_headers(
    expected: &MultiValueMap,
    actual: &MultiValueMap,
    rules: &MatchingRuleCategory,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    for (name, expected_values) in expected.iter() {
        match actual.get_ignore_case(name) {
            Some(actual_values) => mismatches.extend(match_header_values(
                name,
                expected_values,
                actual_values,
                rules.for_name(name),
            )),
            None => mismatches.push(Mismatch::new(
                MismatchKind::Header,
                name,
                expected_values.join(", "),
                "",
                format!("Expected a header '{name}' but was missing"),
            )),
        }
    }

    if let Some(group) = rules.wildcard() {
        for (name, values) in actual
            .iter()
            .filter(|(name, _)| !expected.contains_key_ignore_case(name))
        {
            for value in values {
                let value = Value::String(value.clone());
                mismatches.extend(match_group(
                    group,
                    false,
                    MismatchKind::Header,
                    name,
                    &value,
                    &value,
                ));
            }
        }
    }
    mismatches
}

fn split_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Expected parameters must be present in the actual media type; extra actual
/// parameters are accepted.
fn content_type_satisfied(expected: &ContentType, actual: &ContentType) -> bool {
    expected.base_type() == actual.base_type()
        && expected
            .parameters
            .iter()
            .all(|(k, v)| match actual.parameters.get(k) {
                Some(a) if k == "charset" => a.eq_ignore_ascii_case(v),
                Some(a) => a == v,
                None => false,
            })
}

fn value_mismatch(name: &str, expected: &str, actual: &str) -> Mismatch {
    Mismatch::new(
        MismatchKind::Header,
        name,
        expected,
        actual,
        format!("Expected header '{name}' to have value '{expected}' but was '{actual}'"),
    )
}

fn match_header_values(
    name: &str,
    expected: &[String],
    actual: &[String],
    group: Option<&RuleGroup>,
) -> Vec<Mismatch> {
    if let Some(group) = group {
        let Some(template) = expected.first() else {
            return Vec::new();
        };
        let mut mismatches: Vec<Mismatch> = actual
            .iter()
            .enumerate()
            .flat_map(|(index, actual_value)| {
                let expected_value = expected.get(index).unwrap_or(template);
                match_group(
                    group,
                    false,
                    MismatchKind::Header,
                    name,
                    &Value::String(expected_value.clone()),
                    &Value::String(actual_value.clone()),
                )
            })
            .collect();
        if actual.len() < expected.len() {
            mismatches.push(count_mismatch(name, expected, actual));
        }
        return mismatches;
    }

    if name.eq_ignore_ascii_case("content-type") {
        if let (Some(e), Some(a)) = (expected.first(), actual.first()) {
            if let (Some(ec), Some(ac)) = (ContentType::parse(e), ContentType::parse(a)) {
                return if content_type_satisfied(&ec, &ac) {
                    Vec::new()
                } else {
                    vec![value_mismatch(name, e, a)]
                };
            }
        }
    }

    let (expected_values, actual_values) = if expected.len() == actual.len() {
        (
            expected.iter().map(|v| v.trim().to_string()).collect::<Vec<_>>(),
            actual.iter().map(|v| v.trim().to_string()).collect::<Vec<_>>(),
        )
    } else {
        (split_values(expected), split_values(actual))
    };

    if expected_values.len() != actual_values.len() {
        return vec![count_mismatch(name, &expected_values, &actual_values)];
    }

    expected_values
        .iter()
        .zip(&actual_values)
        .filter(|(e, a)| e != a)
        .map(|(e, a)| value_mismatch(name, e, a))
        .collect()
}

fn count_mismatch(name: &str, expected: &[String], actual: &[String]) -> Mismatch {
    let expected = expected.join(", ");
    let actual = actual.join(", ");
    Mismatch::new(
        MismatchKind::Header,
        name,
        expected.clone(),
        actual.clone(),
        format!("Expected header '{name}' to have values [{expected}] but received [{actual}]"),
    )
}
