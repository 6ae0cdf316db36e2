//! Matching rules: a typed vocabulary of equality relaxations addressed by
//! structural path expressions.
//!
//! ## Module Structure
//!
//! - `path`: path expression grammar, concrete document paths and specificity weights
//! - `rules`: `MatchingRule`, `RuleGroup` and AND/OR logic
//! - `category`: per-category rule sets and best-match selection
//! - `json`: pact JSON layouts for V2 and V3/V4

mod category;
mod json;
mod path;
mod rules;

pub use category::{Category, MatchingRuleCategory, MatchingRules, RuleEntry, SelectedRules};
#[allow(unused_imports)]
pub use json::{
    category_from_json, category_to_json, group_from_json, group_to_json,
    matching_rules_from_json, matching_rules_from_v2, matching_rules_to_json,
    matching_rules_to_v2, rule_from_json, rule_to_json, MatchingRuleError,
};
pub use path::{DocPath, PathError, PathExpression, PathSegment, PathToken};
pub use rules::{ArrayContainsVariant, HttpStatus, MatchingRule, RuleGroup, RuleLogic};
