//! Evaluation of single matching rules and rule groups against values.
//!
//! Every comparison is expressed over `serde_json::Value`: header, query and path
//! values arrive as strings, statuses as numbers.

use super::mismatch::{display_value, plain_value, Mismatch, MismatchKind};
use crate::matchingrules::{MatchingRule, RuleGroup, RuleLogic};
use crate::model::{detect_content_type, ContentType};
use crate::time_format;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

// Process-wide, one entry per distinct pattern in the loaded pacts.
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Full match of `value` against `pattern`, caching compiled expressions.
pub(crate) fn full_match(pattern: &str, value: &str) -> Result<bool, String> {
    let mut cache = REGEX_CACHE.lock();
    if let Some(re) = cache.get(pattern) {
        return Ok(re.is_match(value));
    }
    let re = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| format!("Invalid regex '{pattern}': {e}"))?;
    let matched = re.is_match(value);
    cache.insert(pattern.to_string(), re);
    Ok(matched)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_f64() => "Decimal",
        Value::Number(_) => "Integer",
        Value::String(_) => "String",
        Value::Array(_) => "List",
        Value::Object(_) => "Map",
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn collection_len(value: &Value) -> Option<usize> {
    match value {
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        _ => None,
    }
}

fn check_equality(expected: &Value, actual: &Value) -> Result<(), String> {
    if expected == actual {
        Ok(())
    } else {
        Err(format!(
            "Expected {} but received {}",
            display_value(expected),
            display_value(actual)
        ))
    }
}

fn check_type(expected: &Value, actual: &Value) -> Result<(), String> {
    if same_kind(expected, actual) {
        Ok(())
    } else {
        Err(format!(
            "Expected {} ({}) to be the same type as {} ({})",
            display_value(actual),
            type_name(actual),
            display_value(expected),
            type_name(expected)
        ))
    }
}

fn check_size(
    actual: &Value,
    min: Option<usize>,
    max: Option<usize>,
    cascaded: bool,
) -> Result<(), String> {
    if cascaded {
        return Ok(());
    }
    let Some(len) = collection_len(actual) else {
        return Ok(());
    };
    if let Some(min) = min {
        if len < min {
            return Err(format!(
                "Expected {} (size {len}) to have minimum size of {min}",
                display_value(actual)
            ));
        }
    }
    if let Some(max) = max {
        if len > max {
            return Err(format!(
                "Expected {} (size {len}) to have maximum size of {max}",
                display_value(actual)
            ));
        }
    }
    Ok(())
}

fn parses_as<F>(actual: &Value, kind: &str, accept: F) -> Result<(), String>
where
    F: Fn(&Value) -> bool,
{
    if accept(actual) {
        Ok(())
    } else {
        Err(format!("Expected {} to be {kind}", display_value(actual)))
    }
}

fn is_number(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_decimal(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_f64() || n.as_i64() == Some(0),
        Value::String(s) => s.contains('.') && s.parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::String(s) => s == "true" || s == "false",
        _ => false,
    }
}

fn is_not_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn check_string<F>(actual: &Value, describe: &str, check: F) -> Result<(), String>
where
    F: Fn(&str) -> Result<(), String>,
{
    match scalar_string(actual) {
        Some(s) => check(&s).map_err(|reason| {
            format!("Expected {} to {describe}: {reason}", display_value(actual))
        }),
        None => Err(format!(
            "Expected {} to {describe}, but it is a {}",
            display_value(actual),
            type_name(actual)
        )),
    }
}

/// Sniff raw bytes and compare against an expected media type.
pub(crate) fn check_content_type(bytes: &[u8], expected: &str) -> Result<(), String> {
    let detected = detect_content_type(bytes).and_then(ContentType::parse);
    let wanted = ContentType::parse(expected);
    match (detected, wanted) {
        (Some(d), Some(w)) if d.base_type() == w.base_type() => Ok(()),
        (Some(d), _) => Err(format!(
            "Expected content with type '{expected}' but detected '{}'",
            d.base_type()
        )),
        (None, _) => Err(format!(
            "Expected content with type '{expected}' but the type could not be detected"
        )),
    }
}

/// Evaluate one rule. Structural rules are applied by the tree walk; here they
/// only see scalars, which fall back to equality.
pub(crate) fn check_rule(
    rule: &MatchingRule,
    cascaded: bool,
    expected: &Value,
    actual: &Value,
) -> Result<(), String> {
    match rule {
        MatchingRule::Equality => check_equality(expected, actual),
        MatchingRule::Type => check_type(expected, actual),
        MatchingRule::MinType(min) => {
            check_type(expected, actual)?;
            check_size(actual, Some(*min), None, cascaded)
        }
        MatchingRule::MaxType(max) => {
            check_type(expected, actual)?;
            check_size(actual, None, Some(*max), cascaded)
        }
        MatchingRule::MinMaxType(min, max) => {
            check_type(expected, actual)?;
            check_size(actual, Some(*min), Some(*max), cascaded)
        }
        MatchingRule::Regex(pattern) => check_string(actual, &format!("match '{pattern}'"), |s| {
            match full_match(pattern, s)? {
                true => Ok(()),
                false => Err("no match".to_string()),
            }
        }),
        MatchingRule::Include(needle) => {
            check_string(actual, &format!("include '{needle}'"), |s| {
                if s.contains(needle.as_str()) {
                    Ok(())
                } else {
                    Err("substring not found".to_string())
                }
            })
        }
        MatchingRule::Number => parses_as(actual, "a number", is_number),
        MatchingRule::Integer => parses_as(actual, "an integer", is_integer),
        MatchingRule::Decimal => parses_as(actual, "a decimal number", is_decimal),
        MatchingRule::Boolean => parses_as(actual, "a boolean", is_boolean),
        MatchingRule::Null => parses_as(actual, "null", Value::is_null),
        MatchingRule::NotEmpty => parses_as(actual, "non-empty", is_not_empty),
        MatchingRule::ContentType(mime) => match actual {
            Value::String(s) => check_content_type(s.as_bytes(), mime),
            other => Err(format!(
                "Expected {} to have content type '{mime}'",
                display_value(other)
            )),
        },
        MatchingRule::Date(format) => check_string(actual, "be a date", |s| {
            time_format::parse_date(s, format)
        }),
        MatchingRule::Time(format) => check_string(actual, "be a time", |s| {
            time_format::parse_time(s, format)
        }),
        MatchingRule::Timestamp(format) => check_string(actual, "be a timestamp", |s| {
            time_format::parse_datetime(s, format)
        }),
        MatchingRule::StatusCode(status) => match actual.as_u64() {
            Some(code) if status.matches(code as u16) => Ok(()),
            _ => Err(format!(
                "Expected status {} to be in class '{}'",
                display_value(actual),
                status.name()
            )),
        },
        MatchingRule::Values
        | MatchingRule::ArrayContains(_)
        | MatchingRule::EachKey(_)
        | MatchingRule::EachValue(_) => match actual {
            Value::Array(_) | Value::Object(_) => Ok(()),
            _ => check_equality(expected, actual),
        },
    }
}

/// Evaluate a rule group at one location. AND reports every failing rule; OR is
/// satisfied by any passing rule. An empty group is plain equality.
pub(crate) fn match_group(
    group: &RuleGroup,
    cascaded: bool,
    kind: MismatchKind,
    path: &str,
    expected: &Value,
    actual: &Value,
) -> Vec<Mismatch> {
    let to_mismatch =
        |message: String| Mismatch::new(kind, path, plain_value(expected), plain_value(actual), message);

    if group.is_empty() {
        return check_equality(expected, actual)
            .err()
            .map(to_mismatch)
            .into_iter()
            .collect();
    }

    let failures: Vec<Option<String>> = group
        .rules
        .iter()
        .map(|rule| check_rule(rule, cascaded, expected, actual).err())
        .collect();

    match group.logic {
        RuleLogic::Or if failures.iter().any(Option::is_none) => Vec::new(),
        _ => failures.into_iter().flatten().map(to_mismatch).collect(),
    }
}

/// Equality check with the same mismatch shape as rule failures.
pub(crate) fn match_equality(
    kind: MismatchKind,
    path: &str,
    expected: &Value,
    actual: &Value,
) -> Option<Mismatch> {
    check_equality(expected, actual)
        .err()
        .map(|message| Mismatch::new(kind, path, plain_value(expected), plain_value(actual), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchingrules::HttpStatus;
    use serde_json::json;

    fn check(rule: MatchingRule, expected: Value, actual: Value) -> bool {
        check_rule(&rule, false, &expected, &actual).is_ok()
    }

    #[test]
    fn test_regex_requires_full_match() {
        let rule = MatchingRule::Regex("[0-9]{4}".into());
        assert!(check(rule.clone(), json!("0000"), json!("1234")));
        assert!(!check(rule.clone(), json!("0000"), json!("12345")));
        assert!(check(rule, json!(1), json!(4321)));
    }

    #[test]
    fn test_invalid_regex_is_a_mismatch() {
        let err = check_rule(&MatchingRule::Regex("(".into()), false, &json!("a"), &json!("a"))
            .unwrap_err();
        assert!(err.contains("Invalid regex"));
    }

    #[test]
    fn test_type_rules() {
        assert!(check(MatchingRule::Type, json!("a"), json!("b")));
        assert!(check(MatchingRule::Type, json!(1), json!(2.5)));
        assert!(!check(MatchingRule::Type, json!("1"), json!(1)));
        assert!(!check(MatchingRule::MinType(2), json!([1]), json!([1])));
        assert!(check(MatchingRule::MaxType(2), json!([1]), json!([1, 2])));
        assert!(!check(MatchingRule::MinMaxType(1, 2), json!([1]), json!([1, 2, 3])));
    }

    #[test]
    fn test_size_checks_skipped_when_cascaded() {
        assert!(check_rule(&MatchingRule::MinType(3), true, &json!([1]), &json!([1])).is_ok());
    }

    #[test]
    fn test_numeric_rules() {
        assert!(check(MatchingRule::Integer, json!(1), json!(42)));
        assert!(check(MatchingRule::Integer, json!(1), json!("42")));
        assert!(!check(MatchingRule::Integer, json!(1), json!(4.2)));
        assert!(check(MatchingRule::Decimal, json!(1.5), json!(4.2)));
        assert!(check(MatchingRule::Decimal, json!(1.5), json!(0)));
        assert!(!check(MatchingRule::Decimal, json!(1.5), json!(4)));
        assert!(check(MatchingRule::Number, json!(1), json!(4.2)));
        assert!(!check(MatchingRule::Number, json!(1), json!("abc")));
    }

    #[test]
    fn test_misc_rules() {
        assert!(check(MatchingRule::Boolean, json!(true), json!("false")));
        assert!(check(MatchingRule::Null, json!(null), json!(null)));
        assert!(!check(MatchingRule::NotEmpty, json!("x"), json!("")));
        assert!(check(MatchingRule::Include("ell".into()), json!("hello"), json!("yellow")));
        assert!(check(
            MatchingRule::Date("yyyy-MM-dd".into()),
            json!("2000-01-01"),
            json!("2024-12-31")
        ));
        assert!(!check(
            MatchingRule::Time("HH:mm".into()),
            json!("10:00"),
            json!("10h00")
        ));
        assert!(check(
            MatchingRule::StatusCode(HttpStatus::Success),
            json!(200),
            json!(204)
        ));
        assert!(check(
            MatchingRule::ContentType("application/json".into()),
            json!(""),
            json!("{\"a\": 1}")
        ));
    }

    #[test]
    fn test_group_logic() {
        let and = RuleGroup::new(vec![MatchingRule::Type, MatchingRule::Regex("\\d+".into())]);
        let mismatches = match_group(&and, false, MismatchKind::Body, "$.a", &json!("1"), &json!("x"));
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, "$.a");

        let or = RuleGroup::or(vec![MatchingRule::Null, MatchingRule::Regex("\\d+".into())]);
        assert!(match_group(&or, false, MismatchKind::Body, "$.a", &json!("1"), &json!(null)).is_empty());
        assert_eq!(
            match_group(&or, false, MismatchKind::Body, "$.a", &json!("1"), &json!("x")).len(),
            2
        );
    }

    #[test]
    fn test_empty_group_is_equality() {
        let group = RuleGroup::default();
        assert!(match_group(&group, false, MismatchKind::Body, "$", &json!(1), &json!(1)).is_empty());
        assert_eq!(
            match_group(&group, false, MismatchKind::Body, "$", &json!(1), &json!(2)).len(),
            1
        );
    }
}
