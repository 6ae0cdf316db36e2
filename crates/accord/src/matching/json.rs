//! Lock-step walk of expected and actual JSON trees.

use super::context::MatchingContext;
use super::executor::{match_equality, match_group};
use super::mismatch::{display_value, plain_value, Mismatch};
use crate::matchingrules::{ArrayContainsVariant, DocPath, MatchingRule, RuleGroup};
use serde_json::{Map, Value};
use tracing::warn;

/// Compare two JSON documents, collecting every mismatch in expected-tree order.
pub fn match_json(expected: &Value, actual: &Value, ctx: &MatchingContext<'_>) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    compare(ctx, &DocPath::root(), expected, actual, &mut mismatches);
    mismatches
}

fn compare(
    ctx: &MatchingContext<'_>,
    path: &DocPath,
    expected: &Value,
    actual: &Value,
    out: &mut Vec<Mismatch>,
) {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => compare_maps(ctx, path, expected, e, actual, a, out),
        (Value::Array(e), Value::Array(a)) => compare_lists(ctx, path, expected, e, actual, a, out),
        _ => compare_values(ctx, path, expected, actual, out),
    }
}

fn compare_values(
    ctx: &MatchingContext<'_>,
    path: &DocPath,
    expected: &Value,
    actual: &Value,
    out: &mut Vec<Mismatch>,
) {
    let path_str = path.to_string();
    match ctx.select(path) {
        Some(selected) => out.extend(match_group(
            selected.group,
            selected.cascaded,
            ctx.kind,
            &path_str,
            expected,
            actual,
        )),
        None => out.extend(match_equality(ctx.kind, &path_str, expected, actual)),
    }
}

fn type_rules_only(group: &RuleGroup) -> RuleGroup {
    RuleGroup {
        logic: group.logic,
        rules: group
            .rules
            .iter()
            .filter(|r| r.is_type_matcher())
            .cloned()
            .collect::<Vec<MatchingRule>>(),
    }
}

#[allow(clippy::too_many_arguments)]
fn compare_maps(
    ctx: &MatchingContext<'_>,
    path: &DocPath,
    expected_value: &Value,
    expected: &Map<String, Value>,
    actual_value: &Value,
    actual: &Map<String, Value>,
    out: &mut Vec<Mismatch>,
) {
    if let Some(group) = ctx.direct(path) {
        if group.has_type_matcher() {
            out.extend(match_group(
                &type_rules_only(group),
                false,
                ctx.kind,
                &path.to_string(),
                expected_value,
                actual_value,
            ));
        }

        if let Some(key_rules) = group.each_key() {
            for key in actual.keys() {
                let child = path.field(key);
                let key_value = Value::String(key.clone());
                out.extend(match_group(
                    key_rules,
                    false,
                    ctx.kind,
                    &child.to_string(),
                    &key_value,
                    &key_value,
                ));
            }
        }

        if let Some(value_rules) = group.each_value() {
            let template = expected.values().next();
            for (key, actual_child) in actual {
                let child = path.field(key);
                match expected.get(key).or(template) {
                    Some(expected_child) => {
                        let derived = ctx.with_rules_at(&child, value_rules.clone());
                        compare(&derived, &child, expected_child, actual_child, out);
                    }
                    None => out.extend(match_group(
                        value_rules,
                        false,
                        ctx.kind,
                        &child.to_string(),
                        actual_child,
                        actual_child,
                    )),
                }
            }
            return;
        }

        if group.has_values_rule() || group.each_key().is_some() {
            let template = expected.values().next();
            for (key, actual_child) in actual {
                if let Some(expected_child) = expected.get(key).or(template) {
                    compare(ctx, &path.field(key), expected_child, actual_child, out);
                }
            }
            return;
        }
    }

    for (key, expected_child) in expected {
        let child = path.field(key);
        match actual.get(key) {
            Some(actual_child) => compare(ctx, &child, expected_child, actual_child, out),
            None => out.push(Mismatch::new(
                ctx.kind,
                child.to_string(),
                plain_value(expected_child),
                "",
                format!("Expected key '{key}' but was missing"),
            )),
        }
    }

    if !ctx.allow_unexpected_keys {
        for (key, actual_child) in actual {
            if !expected.contains_key(key) {
                out.push(Mismatch::new(
                    ctx.kind,
                    path.field(key).to_string(),
                    "",
                    plain_value(actual_child),
                    format!(
                        "Unexpected key '{key}' with value {}",
                        display_value(actual_child)
                    ),
                ));
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn compare_lists(
    ctx: &MatchingContext<'_>,
    path: &DocPath,
    expected_value: &Value,
    expected: &[Value],
    actual_value: &Value,
    actual: &[Value],
    out: &mut Vec<Mismatch>,
) {
    let path_str = path.to_string();

    if let Some(selected) = ctx.select(path) {
        let group = selected.group;
        if !selected.cascaded {
            if let Some(variants) = group.array_contains() {
                compare_array_contains(ctx, path, expected, actual_value, actual, variants, out);
                return;
            }
        }

        let each_value = if selected.cascaded {
            None
        } else {
            group.each_value()
        };
        if group.has_type_matcher() || group.has_values_rule() || each_value.is_some() {
            if group.has_type_matcher() {
                out.extend(match_group(
                    &type_rules_only(group),
                    selected.cascaded,
                    ctx.kind,
                    &path_str,
                    expected_value,
                    actual_value,
                ));
            }
            let Some(template) = expected.first() else {
                return;
            };
            for (index, actual_child) in actual.iter().enumerate() {
                let child = path.index(index);
                let expected_child = expected.get(index).unwrap_or(template);
                match each_value {
                    Some(rules) => {
                        let derived = ctx.with_rules_at(&child, rules.clone());
                        compare(&derived, &child, expected_child, actual_child, out);
                    }
                    None => compare(ctx, &child, expected_child, actual_child, out),
                }
            }
            return;
        }
    }

    if expected.len() != actual.len() {
        out.push(Mismatch::new(
            ctx.kind,
            path_str,
            plain_value(expected_value),
            plain_value(actual_value),
            format!(
                "Expected a List with {} elements but received {} elements",
                expected.len(),
                actual.len()
            ),
        ));
    }
    for (index, (expected_child, actual_child)) in expected.iter().zip(actual).enumerate() {
        compare(ctx, &path.index(index), expected_child, actual_child, out);
    }
}

fn compare_array_contains(
    ctx: &MatchingContext<'_>,
    path: &DocPath,
    expected: &[Value],
    actual_value: &Value,
    actual: &[Value],
    variants: &[ArrayContainsVariant],
    out: &mut Vec<Mismatch>,
) {
    for variant in variants {
        let Some(expected_child) = expected.get(variant.index) else {
            warn!(
                "arrayContains variant {} has no expected element at {}",
                variant.index, path
            );
            continue;
        };
        let variant_ctx = ctx.with_category(&variant.rules);
        let found = actual.iter().any(|actual_child| {
            let mut scratch = Vec::new();
            compare(&variant_ctx, &DocPath::root(), expected_child, actual_child, &mut scratch);
            scratch.is_empty()
        });
        if !found {
            out.push(Mismatch::new(
                ctx.kind,
                path.to_string(),
                plain_value(expected_child),
                plain_value(actual_value),
                format!(
                    "Variant at index {} ({}) was not found in the actual list",
                    variant.index,
                    display_value(expected_child)
                ),
            ));
        }
    }
}
