//! The generator vocabulary and its evaluation.

use super::context::{GeneratorContext, GeneratorMode};
use super::date_expression;
use crate::matchingrules::PathError;
use crate::time_format::{self, DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT};
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

const MAX_REGEX_REPEAT: u32 = 10;
const DEFAULT_STRING_SIZE: usize = 20;
const DEFAULT_DIGITS: usize = 10;

/// Errors raised while building or running generators.
///
/// A generator failure means the expectation could not be made concrete. It is
/// never a contract mismatch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeneratorError {
    #[error("No value for '{key}' in the generator context")]
    MissingContextValue { key: String },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Invalid date expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Example '{example}' does not match regex '{regex}'")]
    ExampleMismatch { example: String, regex: String },

    #[error("Invalid format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    #[error("Invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: i64, max: i64 },

    #[error("Generated value '{value}' is not a valid HTTP status")]
    InvalidStatus { value: String },

    #[error("Unknown generator type '{0}'")]
    Unknown(String),

    #[error("Generator '{generator}' is missing field '{field}'")]
    MissingField {
        generator: &'static str,
        field: &'static str,
    },

    #[error(transparent)]
    Path(#[from] PathError),
}

/// How a generated UUID is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UuidFormat {
    Simple,
    #[default]
    LowerHyphenated,
    UpperHyphenated,
    Urn,
}

impl UuidFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            UuidFormat::Simple => "simple",
            UuidFormat::LowerHyphenated => "lower-case-hyphenated",
            UuidFormat::UpperHyphenated => "upper-case-hyphenated",
            UuidFormat::Urn => "URN",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "simple" => Some(UuidFormat::Simple),
            "lower-case-hyphenated" => Some(UuidFormat::LowerHyphenated),
            "upper-case-hyphenated" => Some(UuidFormat::UpperHyphenated),
            n if n.eq_ignore_ascii_case("urn") => Some(UuidFormat::Urn),
            _ => None,
        }
    }
}

/// One way of synthesizing a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    RandomInt { min: i64, max: i64 },
    RandomDecimal { digits: usize },
    RandomHexadecimal { digits: usize },
    /// A string matching a regular expression.
    RandomString { pattern: String },
    RandomBoolean,
    Uuid { format: UuidFormat },
    Date { format: Option<String>, expression: Option<String> },
    Time { format: Option<String>, expression: Option<String> },
    DateTime { format: Option<String>, expression: Option<String> },
    /// A value bound by provider state setup, `${name}` placeholders or a bare key.
    ProviderStateValue { expression: String },
    /// Rebases `example` onto the mock server URL, keeping capture group 1 of `regex`.
    MockServerUrl { example: String, regex: String },
}

impl Generator {
    /// `size` alphanumeric characters.
    pub fn random_string(size: usize) -> Self {
        Generator::RandomString {
            pattern: format!("[a-zA-Z0-9]{{{size}}}"),
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Generator::RandomString {
            pattern: pattern.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Generator::RandomInt { .. } => "RandomInt",
            Generator::RandomDecimal { .. } => "RandomDecimal",
            Generator::RandomHexadecimal { .. } => "RandomHexadecimal",
            Generator::RandomString { .. } => "RandomString",
            Generator::RandomBoolean => "RandomBoolean",
            Generator::Uuid { .. } => "Uuid",
            Generator::Date { .. } => "Date",
            Generator::Time { .. } => "Time",
            Generator::DateTime { .. } => "DateTime",
            Generator::ProviderStateValue { .. } => "ProviderState",
            Generator::MockServerUrl { .. } => "MockServerURL",
        }
    }

    /// Whether this generator runs in `mode`.
    pub fn applies_to(&self, mode: GeneratorMode) -> bool {
        match self {
            Generator::ProviderStateValue { .. } => mode == GeneratorMode::Provider,
            Generator::MockServerUrl { .. } => mode == GeneratorMode::Consumer,
            _ => true,
        }
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        ctx: &GeneratorContext,
        rng: &mut R,
    ) -> Result<Value, GeneratorError> {
        match self {
            Generator::RandomInt { min, max } => {
                if min > max {
                    return Err(GeneratorError::InvalidRange {
                        min: *min,
                        max: *max,
                    });
                }
                Ok(Value::from(rng.gen_range(*min..=*max)))
            }
            Generator::RandomDecimal { digits } => Ok(random_decimal(*digits, rng)),
            Generator::RandomHexadecimal { digits } => {
                let hex: String = (0..*digits)
                    .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
                    .collect();
                Ok(Value::String(hex))
            }
            Generator::RandomString { pattern } => random_from_regex(pattern, rng).map(Value::String),
            Generator::RandomBoolean => Ok(Value::Bool(rng.gen())),
            Generator::Uuid { format } => {
                let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
                let text = match format {
                    UuidFormat::Simple => id.simple().to_string(),
                    UuidFormat::LowerHyphenated => id.hyphenated().to_string(),
                    UuidFormat::UpperHyphenated => id.hyphenated().to_string().to_uppercase(),
                    UuidFormat::Urn => id.urn().to_string(),
                };
                Ok(Value::String(text))
            }
            Generator::Date { format, expression } => {
                date_value(ctx, format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT), expression)
            }
            Generator::Time { format, expression } => {
                date_value(ctx, format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT), expression)
            }
            Generator::DateTime { format, expression } => date_value(
                ctx,
                format.as_deref().unwrap_or(DEFAULT_DATETIME_FORMAT),
                expression,
            ),
            Generator::ProviderStateValue { expression } => provider_state_value(expression, ctx),
            Generator::MockServerUrl { example, regex } => mock_server_url(example, regex, ctx),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, GeneratorError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(GeneratorError::MissingField {
                generator: "generator",
                field: "type",
            })?;
        let str_field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        let usize_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
        };

        let generator = match kind {
            "RandomInt" => Generator::RandomInt {
                min: value.get("min").and_then(Value::as_i64).unwrap_or(0),
                max: value.get("max").and_then(Value::as_i64).unwrap_or(i32::MAX as i64),
            },
            "RandomDecimal" => Generator::RandomDecimal {
                digits: usize_field("digits").unwrap_or(DEFAULT_DIGITS),
            },
            "RandomHexadecimal" => Generator::RandomHexadecimal {
                digits: usize_field("digits").unwrap_or(DEFAULT_DIGITS),
            },
            "RandomString" => Generator::random_string(usize_field("size").unwrap_or(DEFAULT_STRING_SIZE)),
            "Regex" => Generator::RandomString {
                pattern: str_field("regex").ok_or(GeneratorError::MissingField {
                    generator: "Regex",
                    field: "regex",
                })?,
            },
            "RandomBoolean" => Generator::RandomBoolean,
            "Uuid" => Generator::Uuid {
                format: str_field("format")
                    .and_then(|f| UuidFormat::from_name(&f))
                    .unwrap_or_default(),
            },
            "Date" => Generator::Date {
                format: str_field("format"),
                expression: str_field("expression"),
            },
            "Time" => Generator::Time {
                format: str_field("format"),
                expression: str_field("expression"),
            },
            "DateTime" | "Timestamp" => Generator::DateTime {
                format: str_field("format"),
                expression: str_field("expression"),
            },
            "ProviderState" => Generator::ProviderStateValue {
                expression: str_field("expression").ok_or(GeneratorError::MissingField {
                    generator: "ProviderState",
                    field: "expression",
                })?,
            },
            "MockServerURL" => Generator::MockServerUrl {
                example: str_field("example").ok_or(GeneratorError::MissingField {
                    generator: "MockServerURL",
                    field: "example",
                })?,
                regex: str_field("regex").ok_or(GeneratorError::MissingField {
                    generator: "MockServerURL",
                    field: "regex",
                })?,
            },
            other => return Err(GeneratorError::Unknown(other.to_string())),
        };
        Ok(generator)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Generator::RandomInt { min, max } => json!({"type": "RandomInt", "min": min, "max": max}),
            Generator::RandomDecimal { digits } => json!({"type": "RandomDecimal", "digits": digits}),
            Generator::RandomHexadecimal { digits } => {
                json!({"type": "RandomHexadecimal", "digits": digits})
            }
            Generator::RandomString { pattern } => match alphanumeric_size(pattern) {
                Some(size) => json!({"type": "RandomString", "size": size}),
                None => json!({"type": "Regex", "regex": pattern}),
            },
            Generator::RandomBoolean => json!({"type": "RandomBoolean"}),
            Generator::Uuid { format } => match format {
                UuidFormat::LowerHyphenated => json!({"type": "Uuid"}),
                other => json!({"type": "Uuid", "format": other.as_str()}),
            },
            Generator::Date { format, expression }
            | Generator::Time { format, expression }
            | Generator::DateTime { format, expression } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String(self.name().to_string()));
                if let Some(format) = format {
                    obj.insert("format".to_string(), Value::String(format.clone()));
                }
                if let Some(expression) = expression {
                    obj.insert("expression".to_string(), Value::String(expression.clone()));
                }
                Value::Object(obj)
            }
            Generator::ProviderStateValue { expression } => {
                json!({"type": "ProviderState", "expression": expression})
            }
            Generator::MockServerUrl { example, regex } => {
                json!({"type": "MockServerURL", "example": example, "regex": regex})
            }
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn alphanumeric_size(pattern: &str) -> Option<usize> {
    pattern
        .strip_prefix("[a-zA-Z0-9]{")?
        .strip_suffix('}')?
        .parse()
        .ok()
}

fn random_decimal<R: Rng + ?Sized>(digits: usize, rng: &mut R) -> Value {
    let digits = digits.clamp(1, 15);
    let mut text: String = (0..digits)
        .map(|i| {
            let low = if i == 0 && digits > 1 { 1 } else { 0 };
            char::from_digit(rng.gen_range(low..10), 10).unwrap_or('0')
        })
        .collect();
    if digits > 1 {
        let point = rng.gen_range(1..digits);
        text.insert(point, '.');
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text))
}

fn random_from_regex<R: Rng + ?Sized>(pattern: &str, rng: &mut R) -> Result<String, GeneratorError> {
    let trimmed = pattern.strip_prefix('^').unwrap_or(pattern);
    let trimmed = trimmed.strip_suffix('$').unwrap_or(trimmed);
    let generator = rand_regex::Regex::compile(trimmed, MAX_REGEX_REPEAT).map_err(|e| {
        GeneratorError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(rng.sample::<String, _>(&generator))
}

fn date_value(
    ctx: &GeneratorContext,
    format: &str,
    expression: &Option<String>,
) -> Result<Value, GeneratorError> {
    let base = ctx.now();
    let at = match expression.as_deref() {
        Some(expression) => date_expression::evaluate(expression, base).map_err(|reason| {
            GeneratorError::InvalidExpression {
                expression: expression.to_string(),
                reason,
            }
        })?,
        None => base,
    };
    time_format::format_datetime(&at, format)
        .map(Value::String)
        .map_err(|reason| GeneratorError::InvalidFormat {
            format: format.to_string(),
            reason,
        })
}

fn lookup<'a>(ctx: &'a GeneratorContext, key: &str) -> Result<&'a Value, GeneratorError> {
    ctx.provider_state
        .get(key)
        .ok_or_else(|| GeneratorError::MissingContextValue {
            key: key.to_string(),
        })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A lone `${key}` keeps the bound value's JSON type; placeholders embedded in
/// text are substituted as strings.
fn provider_state_value(expression: &str, ctx: &GeneratorContext) -> Result<Value, GeneratorError> {
    if !expression.contains("${") {
        return lookup(ctx, expression).cloned();
    }

    let trimmed = expression.trim();
    if let Some(key) = trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|key| !key.contains("${") && !key.contains('}'))
    {
        return lookup(ctx, key.trim()).cloned();
    }

    let mut out = String::new();
    let mut rest = expression;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(GeneratorError::InvalidExpression {
                expression: expression.to_string(),
                reason: "unterminated '${'".to_string(),
            });
        };
        out.push_str(&as_text(lookup(ctx, after[..end].trim())?));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

fn mock_server_url(example: &str, regex: &str, ctx: &GeneratorContext) -> Result<Value, GeneratorError> {
    let base = ctx
        .mock_server_url
        .as_deref()
        .ok_or_else(|| GeneratorError::MissingContextValue {
            key: "mockServerUrl".to_string(),
        })?;
    let re = Regex::new(regex).map_err(|e| GeneratorError::InvalidRegex {
        pattern: regex.to_string(),
        reason: e.to_string(),
    })?;
    let suffix = re
        .captures(example)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| GeneratorError::ExampleMismatch {
            example: example.to_string(),
            regex: regex.to_string(),
        })?;
    Ok(Value::String(format!("{}{}", base.trim_end_matches('/'), suffix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_random_string_is_deterministic_under_seed() {
        let generator = Generator::regex("[a-z]{5}-[0-9]{3}");
        let ctx = GeneratorContext::consumer();
        let a = generator.generate(&ctx, &mut seeded(42)).unwrap();
        let b = generator.generate(&ctx, &mut seeded(42)).unwrap();
        let c = generator.generate(&ctx, &mut seeded(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let re = Regex::new("^[a-z]{5}-[0-9]{3}$").unwrap();
        assert!(re.is_match(a.as_str().unwrap()));
    }

    #[test]
    fn test_random_string_by_size() {
        let value = Generator::random_string(12)
            .generate(&GeneratorContext::consumer(), &mut seeded(1))
            .unwrap();
        let text = value.as_str().unwrap();
        assert_eq!(text.len(), 12);
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_anchored_regex() {
        let value = Generator::regex("^[0-9]{4}$")
            .generate(&GeneratorContext::consumer(), &mut seeded(7))
            .unwrap();
        assert_eq!(value.as_str().unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_regex() {
        let err = Generator::regex("[unclosed")
            .generate(&GeneratorContext::consumer(), &mut seeded(7))
            .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidRegex { .. }));
    }

    #[test]
    fn test_numeric_generators() {
        let ctx = GeneratorContext::consumer();
        let mut rng = seeded(3);
        for _ in 0..50 {
            let n = Generator::RandomInt { min: 5, max: 9 }
                .generate(&ctx, &mut rng)
                .unwrap()
                .as_i64()
                .unwrap();
            assert!((5..=9).contains(&n));
        }
        assert!(Generator::RandomInt { min: 2, max: 1 }
            .generate(&ctx, &mut rng)
            .is_err());

        let hex = Generator::RandomHexadecimal { digits: 8 }
            .generate(&ctx, &mut rng)
            .unwrap();
        assert_eq!(hex.as_str().unwrap().len(), 8);
        assert!(hex.as_str().unwrap().chars().all(|c| c.is_ascii_hexdigit()));

        let decimal = Generator::RandomDecimal { digits: 6 }
            .generate(&ctx, &mut rng)
            .unwrap();
        assert!(decimal.is_f64());
    }

    #[test]
    fn test_uuid_formats() {
        let ctx = GeneratorContext::consumer();
        let hyphenated = Generator::Uuid {
            format: UuidFormat::LowerHyphenated,
        }
        .generate(&ctx, &mut seeded(9))
        .unwrap();
        assert!(uuid::Uuid::parse_str(hyphenated.as_str().unwrap()).is_ok());
        assert_eq!(hyphenated.as_str().unwrap().len(), 36);

        let simple = Generator::Uuid {
            format: UuidFormat::Simple,
        }
        .generate(&ctx, &mut seeded(9))
        .unwrap();
        assert_eq!(simple.as_str().unwrap().len(), 32);

        let urn = Generator::Uuid { format: UuidFormat::Urn }
            .generate(&ctx, &mut seeded(9))
            .unwrap();
        assert!(urn.as_str().unwrap().starts_with("urn:uuid:"));
    }

    #[test]
    fn test_date_generators() {
        let base = DateTime::parse_from_rfc3339("2024-06-15T08:00:00+00:00").unwrap();
        let ctx = GeneratorContext::consumer().with_base_time(base);
        let mut rng = seeded(0);

        let date = Generator::Date {
            format: None,
            expression: Some("+1 day".to_string()),
        };
        assert_eq!(date.generate(&ctx, &mut rng).unwrap(), json!("2024-06-16"));

        let time = Generator::Time {
            format: Some("HH:mm".to_string()),
            expression: Some("now + 90 minutes".to_string()),
        };
        assert_eq!(time.generate(&ctx, &mut rng).unwrap(), json!("09:30"));

        let datetime = Generator::DateTime {
            format: None,
            expression: None,
        };
        assert_eq!(
            datetime.generate(&ctx, &mut rng).unwrap(),
            json!("2024-06-15T08:00:00")
        );

        let bad = Generator::Date {
            format: None,
            expression: Some("whenever".to_string()),
        };
        assert!(matches!(
            bad.generate(&ctx, &mut rng),
            Err(GeneratorError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_provider_state_values() {
        let ctx = GeneratorContext::provider()
            .with_param("id", json!(42))
            .with_param("name", json!("sam"));
        let mut rng = seeded(0);

        let whole = Generator::ProviderStateValue {
            expression: "${id}".to_string(),
        };
        assert_eq!(whole.generate(&ctx, &mut rng).unwrap(), json!(42));

        let embedded = Generator::ProviderStateValue {
            expression: "/users/${id}/${name}".to_string(),
        };
        assert_eq!(embedded.generate(&ctx, &mut rng).unwrap(), json!("/users/42/sam"));

        let bare = Generator::ProviderStateValue {
            expression: "name".to_string(),
        };
        assert_eq!(bare.generate(&ctx, &mut rng).unwrap(), json!("sam"));

        let missing = Generator::ProviderStateValue {
            expression: "${orderId}".to_string(),
        };
        assert_eq!(
            missing.generate(&ctx, &mut rng).unwrap_err(),
            GeneratorError::MissingContextValue {
                key: "orderId".to_string()
            }
        );
    }

    #[test]
    fn test_mock_server_url() {
        let generator = Generator::MockServerUrl {
            example: "http://localhost:9999/orders/1".to_string(),
            regex: r".*(/orders/\d+)$".to_string(),
        };
        let ctx = GeneratorContext::consumer().with_mock_server_url("http://127.0.0.1:4321/");
        assert_eq!(
            generator.generate(&ctx, &mut seeded(0)).unwrap(),
            json!("http://127.0.0.1:4321/orders/1")
        );

        let err = generator
            .generate(&GeneratorContext::consumer(), &mut seeded(0))
            .unwrap_err();
        assert!(matches!(err, GeneratorError::MissingContextValue { .. }));

        let mismatched = Generator::MockServerUrl {
            example: "http://localhost/other".to_string(),
            regex: r".*(/orders/\d+)$".to_string(),
        };
        assert!(matches!(
            mismatched.generate(&ctx, &mut seeded(0)),
            Err(GeneratorError::ExampleMismatch { .. })
        ));
    }

    #[test]
    fn test_modes() {
        let state = Generator::ProviderStateValue {
            expression: "x".to_string(),
        };
        let url = Generator::MockServerUrl {
            example: String::new(),
            regex: String::new(),
        };
        assert!(!state.applies_to(GeneratorMode::Consumer));
        assert!(state.applies_to(GeneratorMode::Provider));
        assert!(url.applies_to(GeneratorMode::Consumer));
        assert!(!url.applies_to(GeneratorMode::Provider));
        assert!(Generator::RandomBoolean.applies_to(GeneratorMode::Provider));
    }

    #[test]
    fn test_json_forms() {
        let parsed = Generator::from_json(&json!({"type": "RandomString", "size": 8})).unwrap();
        assert_eq!(parsed, Generator::random_string(8));
        assert_eq!(parsed.to_json(), json!({"type": "RandomString", "size": 8}));

        let regex = Generator::from_json(&json!({"type": "Regex", "regex": "\\d+"})).unwrap();
        assert_eq!(regex.to_json(), json!({"type": "Regex", "regex": "\\d+"}));

        let date = Generator::from_json(&json!({"type": "Date", "format": "dd/MM/yyyy"})).unwrap();
        assert_eq!(
            date,
            Generator::Date {
                format: Some("dd/MM/yyyy".to_string()),
                expression: None
            }
        );

        assert!(matches!(
            Generator::from_json(&json!({"type": "Nope"})),
            Err(GeneratorError::Unknown(_))
        ));
        assert!(matches!(
            Generator::from_json(&json!({"type": "ProviderState"})),
            Err(GeneratorError::MissingField { .. })
        ));
    }
}
