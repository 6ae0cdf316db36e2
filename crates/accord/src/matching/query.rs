//! Query parameter comparison.

use super::executor::match_group;
use super::mismatch::{Mismatch, MismatchKind};
use crate::matchingrules::MatchingRuleCategory;
use crate::model::MultiValueMap;
use serde_json::Value;

/// Every expected parameter must be present with matching values, and no
/// parameter outside the expectation may appear.
pub fn match_query(
    expected: &MultiValueMap,
    actual: &MultiValueMap,
    rules: &MatchingRuleCategory,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    for (name, expected_values) in expected.iter() {
        let Some(actual_values) = actual.get(name) else {
            mismatches.push(Mismatch::new(
                MismatchKind::Query,
                name,
                expected_values.join(", "),
                "",
                format!("Expected query parameter '{name}' but was missing"),
            ));
            continue;
        };

        if let Some(group) = rules.for_name(name) {
            let Some(template) = expected_values.first() else {
                continue;
            };
            for (index, actual_value) in actual_values.iter().enumerate() {
                let expected_value = expected_values.get(index).unwrap_or(template);
                mismatches.extend(match_group(
                    group,
                    false,
                    MismatchKind::Query,
                    name,
                    &Value::String(expected_value.clone()),
                    &Value::String(actual_value.clone()),
                ));
            }
            continue;
        }

        if expected_values.len() != actual_values.len() {
            mismatches.push(Mismatch::new(
                MismatchKind::Query,
                name,
                expected_values.join(", "),
                actual_values.join(", "),
                format!(
                    "Expected query parameter '{name}' with {} value(s) [{}] but received {} value(s) [{}]",
                    expected_values.len(),
                    expected_values.join(", "),
                    actual_values.len(),
                    actual_values.join(", ")
                ),
            ));
            continue;
        }

        for (e, a) in expected_values.iter().zip(actual_values) {
            if e != a {
                mismatches.push(Mismatch::new(
                    MismatchKind::Query,
                    name,
                    e.as_str(),
                    a.as_str(),
                    format!("Expected query parameter '{name}' with value '{e}' but received '{a}'"),
                ));
            }
        }
    }

    for (name, values) in actual.iter() {
        if !expected.contains_key(name) {
            mismatches.push(Mismatch::new(
                MismatchKind::Query,
                name,
                "",
                values.join(", "),
                format!("Unexpected query parameter '{name}' received"),
            ));
        }
    }

    mismatches
}
