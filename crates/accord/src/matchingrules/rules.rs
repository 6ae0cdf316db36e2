//! The matching rule vocabulary and AND/OR rule groups.

use super::category::MatchingRuleCategory;
use std::fmt;

/// HTTP status classes used by [`MatchingRule::StatusCode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpStatus {
    Information,
    Success,
    Redirect,
    ClientError,
    ServerError,
    /// Any status below 400.
    NonError,
    /// Any status of 400 or above.
    Error,
    StatusCodes(Vec<u16>),
}

impl HttpStatus {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            HttpStatus::Information => (100..200).contains(&status),
            HttpStatus::Success => (200..300).contains(&status),
            HttpStatus::Redirect => (300..400).contains(&status),
            HttpStatus::ClientError => (400..500).contains(&status),
            HttpStatus::ServerError => (500..600).contains(&status),
            HttpStatus::NonError => status < 400,
            HttpStatus::Error => status >= 400,
            HttpStatus::StatusCodes(codes) => codes.contains(&status),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HttpStatus::Information => "info",
            HttpStatus::Success => "success",
            HttpStatus::Redirect => "redirect",
            HttpStatus::ClientError => "clientError",
            HttpStatus::ServerError => "serverError",
            HttpStatus::NonError => "nonError",
            HttpStatus::Error => "error",
            HttpStatus::StatusCodes(_) => "statusCodes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "info" | "information" => Some(HttpStatus::Information),
            "success" => Some(HttpStatus::Success),
            "redirect" => Some(HttpStatus::Redirect),
            "clientError" => Some(HttpStatus::ClientError),
            "serverError" => Some(HttpStatus::ServerError),
            "nonError" => Some(HttpStatus::NonError),
            "error" => Some(HttpStatus::Error),
            _ => None,
        }
    }
}

/// One element of an [`MatchingRule::ArrayContains`] rule: the expected element
/// at `index` must match at least one actual element under `rules`, whose paths
/// are relative to the element.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayContainsVariant {
    pub index: usize,
    pub rules: MatchingRuleCategory,
}

/// A single relaxation of equality.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchingRule {
    Equality,
    /// Same JSON kind as the expected value.
    Type,
    /// Full match of the string form of the actual value.
    Regex(String),
    MinType(usize),
    MaxType(usize),
    MinMaxType(usize, usize),
    Include(String),
    Number,
    Integer,
    Decimal,
    Boolean,
    Null,
    NotEmpty,
    ContentType(String),
    Date(String),
    Time(String),
    Timestamp(String),
    /// Ignore map keys, compare every value against the expectation.
    Values,
    ArrayContains(Vec<ArrayContainsVariant>),
    EachKey(RuleGroup),
    EachValue(RuleGroup),
    StatusCode(HttpStatus),
}

impl MatchingRule {
    pub fn name(&self) -> &'static str {
        match self {
            MatchingRule::Equality => "equality",
            MatchingRule::Type => "type",
            MatchingRule::Regex(_) => "regex",
            MatchingRule::MinType(_) => "min",
            MatchingRule::MaxType(_) => "max",
            MatchingRule::MinMaxType(_, _) => "minmax",
            MatchingRule::Include(_) => "include",
            MatchingRule::Number => "number",
            MatchingRule::Integer => "integer",
            MatchingRule::Decimal => "decimal",
            MatchingRule::Boolean => "boolean",
            MatchingRule::Null => "null",
            MatchingRule::NotEmpty => "notEmpty",
            MatchingRule::ContentType(_) => "contentType",
            MatchingRule::Date(_) => "date",
            MatchingRule::Time(_) => "time",
            MatchingRule::Timestamp(_) => "timestamp",
            MatchingRule::Values => "values",
            MatchingRule::ArrayContains(_) => "arrayContains",
            MatchingRule::EachKey(_) => "eachKey",
            MatchingRule::EachValue(_) => "eachValue",
            MatchingRule::StatusCode(_) => "statusCode",
        }
    }

    /// Rules that compare by kind and relax collection shape.
    pub fn is_type_matcher(&self) -> bool {
        matches!(
            self,
            MatchingRule::Type
                | MatchingRule::MinType(_)
                | MatchingRule::MaxType(_)
                | MatchingRule::MinMaxType(_, _)
        )
    }

    /// Rules that act on a collection as a whole rather than on a value.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MatchingRule::Values
                | MatchingRule::ArrayContains(_)
                | MatchingRule::EachKey(_)
                | MatchingRule::EachValue(_)
        )
    }
}

impl fmt::Display for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchingRule::Regex(r) => write!(f, "regex({r})"),
            MatchingRule::MinType(n) => write!(f, "min({n})"),
            MatchingRule::MaxType(n) => write!(f, "max({n})"),
            MatchingRule::MinMaxType(min, max) => write!(f, "minmax({min}, {max})"),
            MatchingRule::Include(s) => write!(f, "include({s})"),
            MatchingRule::ContentType(s) => write!(f, "contentType({s})"),
            MatchingRule::Date(s) => write!(f, "date({s})"),
            MatchingRule::Time(s) => write!(f, "time({s})"),
            MatchingRule::Timestamp(s) => write!(f, "timestamp({s})"),
            MatchingRule::StatusCode(s) => write!(f, "statusCode({})", s.name()),
            other => f.write_str(other.name()),
        }
    }
}

/// How the rules of a group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

impl RuleLogic {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLogic::And => "AND",
            RuleLogic::Or => "OR",
        }
    }
}

/// Rules combined by AND or OR. An empty group means equality.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleGroup {
    pub logic: RuleLogic,
    pub rules: Vec<MatchingRule>,
}

impl RuleGroup {
    pub fn new(rules: Vec<MatchingRule>) -> Self {
        Self {
            logic: RuleLogic::And,
            rules,
        }
    }

    pub fn single(rule: MatchingRule) -> Self {
        Self::new(vec![rule])
    }

    pub fn or(rules: Vec<MatchingRule>) -> Self {
        Self {
            logic: RuleLogic::Or,
            rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn add(&mut self, rule: MatchingRule) {
        self.rules.push(rule);
    }

    pub fn has_type_matcher(&self) -> bool {
        self.rules.iter().any(MatchingRule::is_type_matcher)
    }

    pub fn has_values_rule(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, MatchingRule::Values))
    }

    pub fn each_key(&self) -> Option<&RuleGroup> {
        self.rules.iter().find_map(|r| match r {
            MatchingRule::EachKey(g) => Some(g),
            _ => None,
        })
    }

    pub fn each_value(&self) -> Option<&RuleGroup> {
        self.rules.iter().find_map(|r| match r {
            MatchingRule::EachValue(g) => Some(g),
            _ => None,
        })
    }

    pub fn array_contains(&self) -> Option<&[ArrayContainsVariant]> {
        self.rules.iter().find_map(|r| match r {
            MatchingRule::ArrayContains(v) => Some(v.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(HttpStatus::Success.matches(204));
        assert!(!HttpStatus::Success.matches(301));
        assert!(HttpStatus::NonError.matches(302));
        assert!(HttpStatus::Error.matches(503));
        assert!(HttpStatus::StatusCodes(vec![200, 202]).matches(202));
        assert!(!HttpStatus::StatusCodes(vec![200, 202]).matches(201));
    }

    #[test]
    fn test_group_queries() {
        let group = RuleGroup::new(vec![
            MatchingRule::MinType(1),
            MatchingRule::EachValue(RuleGroup::single(MatchingRule::Integer)),
        ]);
        assert!(group.has_type_matcher());
        assert!(!group.has_values_rule());
        assert_eq!(group.each_value().unwrap().rules, vec![MatchingRule::Integer]);
        assert!(group.each_key().is_none());
    }
}
