//! Rule sets keyed by category and path expression.

use super::path::{DocPath, PathError, PathExpression, PathToken};
use super::rules::{MatchingRule, RuleGroup};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// The part of a request, response or message a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Method,
    Path,
    Query,
    Header,
    Body,
    Status,
    Metadata,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Method => "method",
            Category::Path => "path",
            Category::Query => "query",
            Category::Header => "header",
            Category::Body => "body",
            Category::Status => "status",
            Category::Metadata => "metadata",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "method" => Some(Category::Method),
            "path" => Some(Category::Path),
            "query" => Some(Category::Query),
            "header" | "headers" => Some(Category::Header),
            "body" | "content" | "contents" => Some(Category::Body),
            "status" => Some(Category::Status),
            "metadata" => Some(Category::Metadata),
            _ => None,
        }
    }

    /// Body rules are addressed by path expression.
    pub fn is_path_addressed(&self) -> bool {
        matches!(self, Category::Body)
    }

    /// Header, query and metadata rules are addressed by name.
    pub fn is_name_addressed(&self) -> bool {
        matches!(self, Category::Header | Category::Query | Category::Metadata)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One key of a category and the rules stored under it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub key: String,
    pub path: Option<PathExpression>,
    pub group: RuleGroup,
}

/// The rule group chosen for a concrete location.
#[derive(Debug, Clone, Copy)]
pub struct SelectedRules<'a> {
    pub group: &'a RuleGroup,
    /// Selected through an ancestor expression rather than the location itself.
    pub cascaded: bool,
    pub expression: &'a str,
}

/// All rules of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingRuleCategory {
    pub category: Category,
    entries: Vec<RuleEntry>,
}

impl MatchingRuleCategory {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.group.is_empty())
    }

    fn parse_key(&self, key: &str) -> Result<Option<PathExpression>, PathError> {
        if self.category.is_path_addressed() || key.trim_start().starts_with('$') {
            PathExpression::parse(key).map(Some)
        } else {
            Ok(None)
        }
    }

    fn find_entry_mut(&mut self, key: &str) -> Option<&mut RuleEntry> {
        let ignore_case = self.category == Category::Header;
        self.entries.iter_mut().find(|e| {
            if ignore_case {
                e.key.eq_ignore_ascii_case(key)
            } else {
                e.key == key
            }
        })
    }

    /// Add a rule under `key`, appending to an existing group for the same key.
    pub fn add_rule(&mut self, key: &str, rule: MatchingRule) -> Result<(), PathError> {
        if let Some(entry) = self.find_entry_mut(key) {
            entry.group.add(rule);
            return Ok(());
        }
        let path = self.parse_key(key)?;
        self.entries.push(RuleEntry {
            key: key.to_string(),
            path,
            group: RuleGroup::single(rule),
        });
        Ok(())
    }

    /// Set the group for `key`, replacing any existing one.
    pub fn set_group(&mut self, key: &str, group: RuleGroup) -> Result<(), PathError> {
        if let Some(entry) = self.find_entry_mut(key) {
            entry.group = group;
            return Ok(());
        }
        let path = self.parse_key(key)?;
        self.entries.push(RuleEntry {
            key: key.to_string(),
            path,
            group,
        });
        Ok(())
    }

    /// Copy of this category with `group` bound to exactly `path`.
    pub fn with_exact(&self, path: &DocPath, group: RuleGroup) -> Self {
        let mut derived = self.clone();
        let expression = path.to_expression();
        derived.entries.push(RuleEntry {
            key: expression.text().to_string(),
            path: Some(expression),
            group,
        });
        derived
    }

    /// Most specific group applying to a concrete location: highest weight, then
    /// the longer expression text. Later entries win exact ties.
    pub fn select_best(&self, path: &DocPath) -> Option<SelectedRules<'_>> {
        self.entries
            .iter()
            .filter(|e| !e.group.is_empty())
            .filter_map(|e| {
                let expr = e.path.as_ref()?;
                let weight = expr.weight(path);
                (weight > 0).then_some((e, expr, weight))
            })
            .max_by(|(_, a, wa), (_, b, wb)| {
                wa.cmp(wb).then(a.text().len().cmp(&b.text().len()))
            })
            .map(|(entry, expr, _)| SelectedRules {
                group: &entry.group,
                cascaded: expr.tokens().len() < path.len(),
                expression: expr.text(),
            })
    }

    /// Group for a header, query parameter or metadata key.
    pub fn for_name(&self, name: &str) -> Option<&RuleGroup> {
        let ignore_case = self.category == Category::Header;
        let same = |a: &str| {
            if ignore_case {
                a.eq_ignore_ascii_case(name)
            } else {
                a == name
            }
        };
        self.entries
            .iter()
            .filter(|e| !e.group.is_empty())
            .find(|e| match &e.path {
                None => same(&e.key),
                Some(expr) => expr.single_field().map(same).unwrap_or(false),
            })
            .map(|e| &e.group)
    }

    /// Group keyed `$` or `$.*`, applied to names absent from the expectation.
    pub fn wildcard(&self) -> Option<&RuleGroup> {
        self.entries
            .iter()
            .filter(|e| !e.group.is_empty())
            .find(|e| match &e.path {
                Some(expr) => matches!(expr.tokens(), [PathToken::Root] | [PathToken::Root, PathToken::Star]),
                None => false,
            })
            .map(|e| &e.group)
    }

    /// The single group of a path, method or status category.
    pub fn root(&self) -> Option<&RuleGroup> {
        self.entries
            .iter()
            .filter(|e| !e.group.is_empty())
            .find(|e| match &e.path {
                Some(expr) => expr.is_root(),
                None => !self.category.is_name_addressed(),
            })
            .map(|e| &e.group)
    }
}

/// Matching rules of one request, response or message, by category.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchingRules {
    categories: BTreeMap<Category, MatchingRuleCategory>,
}

impl MatchingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(
        &mut self,
        category: Category,
        key: &str,
        rule: MatchingRule,
    ) -> Result<(), PathError> {
        self.categories
            .entry(category)
            .or_insert_with(|| MatchingRuleCategory::new(category))
            .add_rule(key, rule)
    }

    pub fn set_group(
        &mut self,
        category: Category,
        key: &str,
        group: RuleGroup,
    ) -> Result<(), PathError> {
        self.categories
            .entry(category)
            .or_insert_with(|| MatchingRuleCategory::new(category))
            .set_group(key, group)
    }

    pub fn category(&self, category: Category) -> Option<&MatchingRuleCategory> {
        self.categories.get(&category)
    }

    /// The category's rules, or an empty set.
    pub fn rules_for(&self, category: Category) -> Cow<'_, MatchingRuleCategory> {
        match self.categories.get(&category) {
            Some(c) => Cow::Borrowed(c),
            None => Cow::Owned(MatchingRuleCategory::new(category)),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &MatchingRuleCategory> {
        self.categories.values()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(MatchingRuleCategory::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_best_prefers_specific_expression() {
        let mut rules = MatchingRuleCategory::new(Category::Body);
        rules.add_rule("$.items", MatchingRule::MinType(1)).unwrap();
        rules.add_rule("$.items[*].id", MatchingRule::Integer).unwrap();
        rules
            .add_rule("$.items[1].id", MatchingRule::Regex("\\d+".into()))
            .unwrap();

        let path = DocPath::root().field("items").index(1).field("id");
        let selected = rules.select_best(&path).unwrap();
        assert_eq!(selected.expression, "$.items[1].id");
        assert!(!selected.cascaded);

        let path = DocPath::root().field("items").index(0).field("id");
        let selected = rules.select_best(&path).unwrap();
        assert_eq!(selected.group.rules, vec![MatchingRule::Integer]);

        let path = DocPath::root().field("items").index(0).field("name");
        let selected = rules.select_best(&path).unwrap();
        assert_eq!(selected.expression, "$.items");
        assert!(selected.cascaded);

        assert!(rules.select_best(&DocPath::root().field("other")).is_none());
    }

    #[test]
    fn test_add_rule_appends_to_group() {
        let mut rules = MatchingRuleCategory::new(Category::Body);
        rules.add_rule("$.id", MatchingRule::Type).unwrap();
        rules.add_rule("$.id", MatchingRule::Regex("\\d+".into())).unwrap();
        assert_eq!(rules.entries().len(), 1);
        assert_eq!(rules.entries()[0].group.rules.len(), 2);
    }

    #[test]
    fn test_invalid_body_key_is_rejected() {
        let mut rules = MatchingRules::new();
        assert!(rules
            .add_rule(Category::Body, "items[", MatchingRule::Type)
            .is_err());
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let mut rules = MatchingRuleCategory::new(Category::Header);
        rules
            .add_rule("Content-Type", MatchingRule::Regex("application/.*".into()))
            .unwrap();
        assert!(rules.for_name("content-type").is_some());
        assert!(rules.wildcard().is_none());

        rules.add_rule("$", MatchingRule::Regex("\\w+".into())).unwrap();
        assert!(rules.wildcard().is_some());
    }

    #[test]
    fn test_query_names_are_case_sensitive() {
        let mut rules = MatchingRuleCategory::new(Category::Query);
        rules.add_rule("page", MatchingRule::Integer).unwrap();
        assert!(rules.for_name("page").is_some());
        assert!(rules.for_name("Page").is_none());
    }

    #[test]
    fn test_with_exact_overrides_ancestor() {
        let mut rules = MatchingRuleCategory::new(Category::Body);
        rules.add_rule("$.map", MatchingRule::Values).unwrap();
        let path = DocPath::root().field("map").field("a");
        let derived = rules.with_exact(&path, RuleGroup::single(MatchingRule::Integer));
        let selected = derived.select_best(&path).unwrap();
        assert_eq!(selected.group.rules, vec![MatchingRule::Integer]);
        assert!(!selected.cascaded);
    }
}
