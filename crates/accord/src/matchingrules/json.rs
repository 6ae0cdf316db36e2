//! Conversion between matching rules and their pact JSON representation.
//!
//! V3 and V4 documents nest rules per category (`{"body": {"$.id": {"matchers": [...]}}}`),
//! while V2 documents use flat keys such as `$.body.id` or `$.headers.Accept`.

use super::category::{Category, MatchingRuleCategory, MatchingRules};
use super::path::{PathError, PathExpression, PathToken};
use super::rules::{ArrayContainsVariant, HttpStatus, MatchingRule, RuleGroup, RuleLogic};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum MatchingRuleError {
    #[error("Unknown matching rule '{0}'")]
    Unknown(String),
    #[error("Matching rule '{rule}' requires '{field}'")]
    MissingField { rule: String, field: &'static str },
    #[error("Matching rule definition must be a JSON object, got {0}")]
    NotAnObject(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

fn missing(rule: &str, field: &'static str) -> MatchingRuleError {
    MatchingRuleError::MissingField {
        rule: rule.to_string(),
        field,
    }
}

fn as_usize(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Parse one rule object such as `{"match": "regex", "regex": "\\d+"}`.
pub fn rule_from_json(value: &Value) -> Result<MatchingRule, MatchingRuleError> {
    let obj = value
        .as_object()
        .ok_or_else(|| MatchingRuleError::NotAnObject(value.to_string()))?;

    let kind = match obj.get("match").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        // V2 rules omit `match` and are identified by their attributes
        None if obj.contains_key("regex") => "regex".to_string(),
        None if obj.contains_key("min") || obj.contains_key("max") => "type".to_string(),
        None if obj.contains_key("timestamp") => "timestamp".to_string(),
        None if obj.contains_key("date") => "date".to_string(),
        None if obj.contains_key("time") => "time".to_string(),
        None => return Err(MatchingRuleError::Unknown(value.to_string())),
    };

    let min = as_usize(obj.get("min"));
    let max = as_usize(obj.get("max"));
    let format = |names: &[&str]| names.iter().find_map(|n| as_string(obj.get(*n)));

    let rule = match kind.as_str() {
        "equality" => MatchingRule::Equality,
        "type" => match (min, max) {
            (Some(min), Some(max)) => MatchingRule::MinMaxType(min, max),
            (Some(min), None) => MatchingRule::MinType(min),
            (None, Some(max)) => MatchingRule::MaxType(max),
            (None, None) => MatchingRule::Type,
        },
        "min" => MatchingRule::MinType(min.ok_or_else(|| missing("min", "min"))?),
        "max" => MatchingRule::MaxType(max.ok_or_else(|| missing("max", "max"))?),
        "minmax" => MatchingRule::MinMaxType(
            min.ok_or_else(|| missing("minmax", "min"))?,
            max.ok_or_else(|| missing("minmax", "max"))?,
        ),
        "regex" => MatchingRule::Regex(
            as_string(obj.get("regex")).ok_or_else(|| missing("regex", "regex"))?,
        ),
        "include" => MatchingRule::Include(
            as_string(obj.get("value")).ok_or_else(|| missing("include", "value"))?,
        ),
        "number" => MatchingRule::Number,
        "integer" => MatchingRule::Integer,
        "decimal" | "real" => MatchingRule::Decimal,
        "boolean" => MatchingRule::Boolean,
        "null" => MatchingRule::Null,
        "notEmpty" => MatchingRule::NotEmpty,
        "contentType" => MatchingRule::ContentType(
            as_string(obj.get("value")).ok_or_else(|| missing("contentType", "value"))?,
        ),
        "date" => MatchingRule::Date(format(&["format", "date"]).unwrap_or_default()),
        "time" => MatchingRule::Time(format(&["format", "time"]).unwrap_or_default()),
        "timestamp" | "datetime" => {
            MatchingRule::Timestamp(format(&["format", "timestamp", "datetime"]).unwrap_or_default())
        }
        "values" => MatchingRule::Values,
        "eachKey" => MatchingRule::EachKey(nested_group(obj, "eachKey")?),
        "eachValue" => MatchingRule::EachValue(nested_group(obj, "eachValue")?),
        "arrayContains" => {
            let variants = obj
                .get("variants")
                .and_then(Value::as_array)
                .ok_or_else(|| missing("arrayContains", "variants"))?;
            let mut parsed = Vec::with_capacity(variants.len());
            for (position, variant) in variants.iter().enumerate() {
                let index = as_usize(variant.get("index")).unwrap_or(position);
                let rules = match variant.get("rules") {
                    Some(rules) => category_from_json(Category::Body, rules)?,
                    None => MatchingRuleCategory::new(Category::Body),
                };
                parsed.push(ArrayContainsVariant { index, rules });
            }
            MatchingRule::ArrayContains(parsed)
        }
        "statusCode" => {
            let status = match obj.get("status") {
                Some(Value::Array(codes)) => HttpStatus::StatusCodes(
                    codes
                        .iter()
                        .filter_map(|c| c.as_u64().map(|c| c as u16))
                        .collect(),
                ),
                Some(Value::String(name)) => HttpStatus::from_name(name)
                    .ok_or_else(|| MatchingRuleError::Unknown(format!("statusCode({name})")))?,
                _ => return Err(missing("statusCode", "status")),
            };
            MatchingRule::StatusCode(status)
        }
        other => return Err(MatchingRuleError::Unknown(other.to_string())),
    };
    Ok(rule)
}

fn nested_group(obj: &Map<String, Value>, rule: &str) -> Result<RuleGroup, MatchingRuleError> {
    let rules = obj
        .get("rules")
        .and_then(Value::as_array)
        .ok_or_else(|| missing(rule, "rules"))?;
    let rules = rules
        .iter()
        .map(rule_from_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleGroup::new(rules))
}

pub fn rule_to_json(rule: &MatchingRule) -> Value {
    match rule {
        MatchingRule::Equality => json!({"match": "equality"}),
        MatchingRule::Type => json!({"match": "type"}),
        MatchingRule::Regex(r) => json!({"match": "regex", "regex": r}),
        MatchingRule::MinType(min) => json!({"match": "type", "min": min}),
        MatchingRule::MaxType(max) => json!({"match": "type", "max": max}),
        MatchingRule::MinMaxType(min, max) => json!({"match": "type", "min": min, "max": max}),
        MatchingRule::Include(v) => json!({"match": "include", "value": v}),
        MatchingRule::Number => json!({"match": "number"}),
        MatchingRule::Integer => json!({"match": "integer"}),
        MatchingRule::Decimal => json!({"match": "decimal"}),
        MatchingRule::Boolean => json!({"match": "boolean"}),
        MatchingRule::Null => json!({"match": "null"}),
        MatchingRule::NotEmpty => json!({"match": "notEmpty"}),
        MatchingRule::ContentType(v) => json!({"match": "contentType", "value": v}),
        MatchingRule::Date(f) => json!({"match": "date", "format": f}),
        MatchingRule::Time(f) => json!({"match": "time", "format": f}),
        MatchingRule::Timestamp(f) => json!({"match": "timestamp", "format": f}),
        MatchingRule::Values => json!({"match": "values"}),
        MatchingRule::EachKey(group) => {
            json!({"match": "eachKey", "rules": group.rules.iter().map(rule_to_json).collect::<Vec<_>>()})
        }
        MatchingRule::EachValue(group) => {
            json!({"match": "eachValue", "rules": group.rules.iter().map(rule_to_json).collect::<Vec<_>>()})
        }
        MatchingRule::ArrayContains(variants) => json!({
            "match": "arrayContains",
            "variants": variants
                .iter()
                .map(|v| json!({"index": v.index, "rules": category_to_json(&v.rules)}))
                .collect::<Vec<_>>()
        }),
        MatchingRule::StatusCode(HttpStatus::StatusCodes(codes)) => {
            json!({"match": "statusCode", "status": codes})
        }
        MatchingRule::StatusCode(status) => json!({"match": "statusCode", "status": status.name()}),
    }
}

/// Parse `{"matchers": [...], "combine": "OR"}` or a bare V2 rule object.
pub fn group_from_json(value: &Value) -> Result<RuleGroup, MatchingRuleError> {
    match value.get("matchers").and_then(Value::as_array) {
        Some(matchers) => {
            let logic = match value.get("combine").and_then(Value::as_str) {
                Some(c) if c.eq_ignore_ascii_case("or") => RuleLogic::Or,
                _ => RuleLogic::And,
            };
            let mut rules = Vec::with_capacity(matchers.len());
            for matcher in matchers {
                match rule_from_json(matcher) {
                    Ok(rule) => rules.push(rule),
                    Err(MatchingRuleError::Unknown(name)) => {
                        warn!("Ignoring unknown matching rule {}", name);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(RuleGroup { logic, rules })
        }
        None => Ok(RuleGroup::single(rule_from_json(value)?)),
    }
}

pub fn group_to_json(group: &RuleGroup) -> Value {
    let mut obj = Map::new();
    obj.insert(
        "matchers".to_string(),
        Value::Array(group.rules.iter().map(rule_to_json).collect()),
    );
    if group.logic == RuleLogic::Or {
        obj.insert("combine".to_string(), json!("OR"));
    }
    Value::Object(obj)
}

/// Parse one category. Path, method and status categories may hold a single group
/// directly instead of a key map.
pub fn category_from_json(
    category: Category,
    value: &Value,
) -> Result<MatchingRuleCategory, MatchingRuleError> {
    let mut parsed = MatchingRuleCategory::new(category);
    let obj = value
        .as_object()
        .ok_or_else(|| MatchingRuleError::NotAnObject(value.to_string()))?;
    if obj.contains_key("matchers") {
        parsed.set_group("$", group_from_json(value)?)?;
        return Ok(parsed);
    }
    for (key, group) in obj {
        parsed.set_group(key, group_from_json(group)?)?;
    }
    Ok(parsed)
}

pub fn category_to_json(category: &MatchingRuleCategory) -> Value {
    let single_group = matches!(
        category.category,
        Category::Path | Category::Method | Category::Status
    );
    if single_group {
        if let Some(group) = category.root() {
            return group_to_json(group);
        }
    }
    let entries = category
        .entries()
        .iter()
        .filter(|e| !e.group.is_empty())
        .map(|e| (e.key.clone(), group_to_json(&e.group)))
        .collect::<Map<_, _>>();
    Value::Object(entries)
}

/// Parse the V3/V4 nested layout.
pub fn matching_rules_from_json(value: &Value) -> Result<MatchingRules, MatchingRuleError> {
    let mut rules = MatchingRules::new();
    let Some(obj) = value.as_object() else {
        return Ok(rules);
    };
    for (name, definition) in obj {
        let Some(category) = Category::from_name(name) else {
            warn!("Ignoring matching rules for unknown category '{}'", name);
            continue;
        };
        let parsed = category_from_json(category, definition)?;
        for entry in parsed.entries() {
            rules.set_group(category, &entry.key, entry.group.clone())?;
        }
    }
    Ok(rules)
}

pub fn matching_rules_to_json(rules: &MatchingRules) -> Value {
    let obj = rules
        .categories()
        .filter(|c| !c.is_empty())
        .map(|c| (c.category.name().to_string(), category_to_json(c)))
        .collect::<Map<_, _>>();
    Value::Object(obj)
}

/// Parse the V2 flat layout (`$.body.items[*]`, `$.headers.Accept`, `$.path`).
pub fn matching_rules_from_v2(value: &Value) -> Result<MatchingRules, MatchingRuleError> {
    let mut rules = MatchingRules::new();
    let Some(obj) = value.as_object() else {
        return Ok(rules);
    };
    for (key, definition) in obj {
        let expr = PathExpression::parse(key)?;
        let tokens = expr.tokens();
        let group = group_from_json(definition)?;
        match tokens.get(1) {
            Some(PathToken::Field(section)) if section == "body" => {
                let rest = v2_rest(key, "body");
                rules.set_group(Category::Body, &format!("${rest}"), group)?;
            }
            Some(PathToken::Field(section)) if section == "headers" || section == "query" => {
                let category = if section == "headers" {
                    Category::Header
                } else {
                    Category::Query
                };
                match tokens.get(2) {
                    Some(PathToken::Field(name)) => rules.set_group(category, name, group)?,
                    _ => warn!("Ignoring V2 matching rule with no name: {}", key),
                }
            }
            Some(PathToken::Field(section)) if section == "path" => {
                rules.set_group(Category::Path, "$", group)?
            }
            Some(PathToken::Field(section)) if section == "status" => {
                rules.set_group(Category::Status, "$", group)?
            }
            _ => warn!("Ignoring V2 matching rule with unknown key: {}", key),
        }
    }
    Ok(rules)
}

fn v2_rest<'a>(key: &'a str, section: &str) -> &'a str {
    let trimmed = key.trim();
    let prefix_len = 1 + 1 + section.len();
    trimmed.get(prefix_len..).unwrap_or("")
}

pub fn matching_rules_to_v2(rules: &MatchingRules) -> Value {
    let mut obj = Map::new();
    for category in rules.categories() {
        for entry in category.entries().iter().filter(|e| !e.group.is_empty()) {
            // V2 groups hold a single rule; extra rules are not representable
            let Some(rule) = entry.group.rules.first() else {
                continue;
            };
            let key = match category.category {
                Category::Body => {
                    let text = entry.path.as_ref().map(|p| p.text()).unwrap_or("$");
                    format!("$.body{}", text.trim_start_matches('$'))
                }
                Category::Header => format!("$.headers.{}", entry.key),
                Category::Query => format!("$.query.{}", entry.key),
                Category::Path => "$.path".to_string(),
                Category::Status => "$.status".to_string(),
                Category::Method | Category::Metadata => continue,
            };
            obj.insert(key, rule_to_json(rule));
        }
    }
    Value::Object(obj)
}
