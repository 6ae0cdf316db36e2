//! Rule lookup during a tree walk.

use super::mismatch::MismatchKind;
use crate::matchingrules::{DocPath, MatchingRuleCategory, RuleGroup, SelectedRules};
use std::borrow::Cow;

/// The rules in force for one comparison, plus walk options.
#[derive(Debug, Clone)]
pub struct MatchingContext<'a> {
    rules: Cow<'a, MatchingRuleCategory>,
    pub kind: MismatchKind,
    /// Tolerate keys present in actual objects but absent from the expectation.
    pub allow_unexpected_keys: bool,
}

impl<'a> MatchingContext<'a> {
    pub fn new(rules: &'a MatchingRuleCategory, kind: MismatchKind) -> Self {
        Self {
            rules: Cow::Borrowed(rules),
            kind,
            allow_unexpected_keys: false,
        }
    }

    pub fn allowing_unexpected_keys(mut self, allow: bool) -> Self {
        self.allow_unexpected_keys = allow;
        self
    }

    pub fn rules(&self) -> &MatchingRuleCategory {
        &self.rules
    }

    pub fn select(&self, path: &DocPath) -> Option<SelectedRules<'_>> {
        self.rules.select_best(path)
    }

    /// Rules selected for exactly this location, ignoring ancestors.
    pub fn direct(&self, path: &DocPath) -> Option<&RuleGroup> {
        self.select(path).filter(|s| !s.cascaded).map(|s| s.group)
    }

    /// Derived context with `group` bound to exactly `path`.
    pub fn with_rules_at(&self, path: &DocPath, group: RuleGroup) -> MatchingContext<'a> {
        MatchingContext {
            rules: Cow::Owned(self.rules.with_exact(path, group)),
            kind: self.kind,
            allow_unexpected_keys: self.allow_unexpected_keys,
        }
    }

    /// Fresh context for a different rule set, keeping options.
    pub fn with_category<'b>(&self, rules: &'b MatchingRuleCategory) -> MatchingContext<'b> {
        MatchingContext {
            rules: Cow::Borrowed(rules),
            kind: self.kind,
            allow_unexpected_keys: self.allow_unexpected_keys,
        }
    }
}
