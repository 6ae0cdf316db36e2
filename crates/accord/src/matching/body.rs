//! Body comparison, dispatched on content type.

use super::context::MatchingContext;
use super::executor::{check_content_type, check_rule};
use super::json::match_json;
use super::mismatch::{Mismatch, MismatchKind};
use crate::matchingrules::{DocPath, MatchingRule, RuleLogic};
use crate::model::{ContentType, MultiValueMap, OptionalBody};
use serde_json::Value;
use tracing::debug;

const PREVIEW_LIMIT: usize = 200;

fn preview(body: &OptionalBody) -> String {
    let text = body.as_str_lossy();
    if text.chars().count() > PREVIEW_LIMIT {
        let cut: String = text.chars().take(PREVIEW_LIMIT).collect();
        format!("{cut}...")
    } else {
        text.into_owned()
    }
}

fn body_mismatch(expected: String, actual: String, message: String) -> Mismatch {
    Mismatch::new(MismatchKind::Body, "$", expected, actual, message)
}

fn form_to_json(body: &OptionalBody) -> Value {
    let map = MultiValueMap::from_query_string(&body.as_str_lossy());
    Value::Object(
        map.iter()
            .map(|(k, values)| {
                (
                    k.to_string(),
                    Value::Array(values.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect(),
    )
}

/// Compare two bodies. The content types are those declared by the enclosing
/// request, response or message.
pub fn match_body(
    expected: &OptionalBody,
    expected_type: Option<ContentType>,
    actual: &OptionalBody,
    actual_type: Option<ContentType>,
    ctx: &MatchingContext<'_>,
) -> Vec<Mismatch> {
    match expected {
        OptionalBody::Missing => return Vec::new(),
        OptionalBody::Empty => {
            return if actual.bytes().is_empty() {
                Vec::new()
            } else {
                vec![body_mismatch(
                    String::new(),
                    preview(actual),
                    format!("Expected an empty body but received '{}'", preview(actual)),
                )]
            };
        }
        OptionalBody::Null | OptionalBody::Present { .. } => {}
    }

    if !actual.is_present() && !matches!(actual, OptionalBody::Null) {
        return vec![body_mismatch(
            preview(expected),
            String::new(),
            format!("Expected body '{}' but was missing", preview(expected)),
        )];
    }

    if let (Some(e), Some(a)) = (&expected_type, &actual_type) {
        if !(e.is_json() && a.is_json()) && e.base_type() != a.base_type() {
            return vec![Mismatch::new(
                MismatchKind::BodyType,
                "$",
                e.base_type(),
                a.base_type(),
                format!(
                    "Expected a body of type '{}' but received '{}'",
                    e.base_type(),
                    a.base_type()
                ),
            )];
        }
    }

    let content_type = expected_type.or(actual_type);
    let is_json = content_type.as_ref().map(ContentType::is_json).unwrap_or(false)
        || matches!(expected, OptionalBody::Null);

    if is_json {
        if let Some(expected_json) = expected.as_json() {
            debug!("Comparing JSON bodies");
            return match actual.as_json() {
                Some(actual_json) => match_json(&expected_json, &actual_json, ctx),
                None => vec![body_mismatch(
                    preview(expected),
                    preview(actual),
                    format!("Failed to parse the actual body as JSON: '{}'", preview(actual)),
                )],
            };
        }
    }

    if content_type
        .as_ref()
        .map(ContentType::is_form_urlencoded)
        .unwrap_or(false)
    {
        debug!("Comparing form bodies");
        return match_json(&form_to_json(expected), &form_to_json(actual), ctx);
    }

    match_raw(expected, actual, ctx)
}

/// Non-structured bodies are a single scalar governed by the root rule, if any.
fn match_raw(
    expected: &OptionalBody,
    actual: &OptionalBody,
    ctx: &MatchingContext<'_>,
) -> Vec<Mismatch> {
    let Some(group) = ctx.direct(&DocPath::root()) else {
        if expected.bytes() == actual.bytes() {
            return Vec::new();
        }
        return vec![body_mismatch(
            preview(expected),
            preview(actual),
            format!(
                "Expected body '{}' but received '{}'",
                preview(expected),
                preview(actual)
            ),
        )];
    };

    let expected_text = Value::String(expected.as_str_lossy().into_owned());
    let actual_text = Value::String(actual.as_str_lossy().into_owned());
    let failures: Vec<Option<String>> = group
        .rules
        .iter()
        .map(|rule| match rule {
            MatchingRule::ContentType(mime) => check_content_type(actual.bytes(), mime).err(),
            other => check_rule(other, false, &expected_text, &actual_text).err(),
        })
        .collect();

    if group.logic == RuleLogic::Or && failures.iter().any(Option::is_none) {
        return Vec::new();
    }
    failures
        .into_iter()
        .flatten()
        .map(|message| body_mismatch(preview(expected), preview(actual), message))
        .collect()
}
