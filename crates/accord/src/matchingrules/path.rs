//! Structural path expressions (`$.items[*].id`) and concrete document paths.
//!
//! Expressions are parsed once into tokens. Resolving which expression applies to
//! a concrete location is a weight computation over the token sequence:
//! exact field or index tokens weigh 2, wildcards weigh 1, and any token that
//! does not match the location zeroes the whole expression.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid path expression '{expression}': {reason}")]
pub struct PathError {
    pub expression: String,
    pub reason: String,
}

impl PathError {
    fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// One parsed element of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathToken {
    Root,
    Field(String),
    Index(usize),
    /// `.*`: any field or index.
    Star,
    /// `[*]`: any index.
    StarIndex,
}

/// One element of a concrete location in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A concrete location, rooted at `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocPath {
    segments: Vec<PathSegment>,
}

impl DocPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name.to_string()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Token count including the root.
    pub fn len(&self) -> usize {
        self.segments.len() + 1
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The expression that addresses exactly this location.
    pub fn to_expression(&self) -> PathExpression {
        let mut tokens = vec![PathToken::Root];
        tokens.extend(self.segments.iter().map(|s| match s {
            PathSegment::Field(name) => PathToken::Field(name.clone()),
            PathSegment::Index(i) => PathToken::Index(*i),
        }));
        PathExpression {
            text: self.to_string(),
            tokens,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '@' || c == ':')
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) if is_identifier(name) => write!(f, ".{name}")?,
                PathSegment::Field(name) => write!(f, "['{name}']")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// A parsed path expression.
#[derive(Debug, Clone)]
pub struct PathExpression {
    text: String,
    tokens: Vec<PathToken>,
}

impl PartialEq for PathExpression {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for PathExpression {}

impl PathExpression {
    /// Parse an expression. An empty string addresses the root.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self {
                text: "$".to_string(),
                tokens: vec![PathToken::Root],
            });
        }

        let chars: Vec<char> = trimmed.chars().collect();
        if chars[0] != '$' {
            return Err(PathError::new(text, "expression must start with '$'"));
        }

        let mut tokens = vec![PathToken::Root];
        let mut pos = 1;
        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    if pos < chars.len() && chars[pos] == '*' {
                        tokens.push(PathToken::Star);
                        pos += 1;
                        continue;
                    }
                    let start = pos;
                    while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                        pos += 1;
                    }
                    if start == pos {
                        return Err(PathError::new(text, format!("empty field name at {start}")));
                    }
                    tokens.push(PathToken::Field(chars[start..pos].iter().collect()));
                }
                '[' => {
                    pos += 1;
                    match chars.get(pos) {
                        Some('*') => {
                            pos += 1;
                            expect_char(&chars, pos, ']', text)?;
                            tokens.push(PathToken::StarIndex);
                            pos += 1;
                        }
                        Some('\'') | Some('"') => {
                            let quote = chars[pos];
                            pos += 1;
                            let start = pos;
                            while pos < chars.len() && chars[pos] != quote {
                                pos += 1;
                            }
                            if pos >= chars.len() {
                                return Err(PathError::new(text, "unterminated quoted field"));
                            }
                            let name: String = chars[start..pos].iter().collect();
                            pos += 1;
                            expect_char(&chars, pos, ']', text)?;
                            tokens.push(PathToken::Field(name));
                            pos += 1;
                        }
                        Some(c) if c.is_ascii_digit() => {
                            let start = pos;
                            while pos < chars.len() && chars[pos].is_ascii_digit() {
                                pos += 1;
                            }
                            let digits: String = chars[start..pos].iter().collect();
                            let index = digits
                                .parse::<usize>()
                                .map_err(|e| PathError::new(text, e.to_string()))?;
                            expect_char(&chars, pos, ']', text)?;
                            tokens.push(PathToken::Index(index));
                            pos += 1;
                        }
                        _ => {
                            return Err(PathError::new(
                                text,
                                format!("expected an index, '*' or a quoted field at {pos}"),
                            ))
                        }
                    }
                }
                c => {
                    return Err(PathError::new(text, format!("unexpected character '{c}' at {pos}")))
                }
            }
        }

        Ok(Self {
            text: trimmed.to_string(),
            tokens,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.tokens.len() == 1
    }

    /// Field name if this expression is `$.name` or `$['name']`.
    pub fn single_field(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [PathToken::Root, PathToken::Field(name)] => Some(name),
            _ => None,
        }
    }

    /// Specificity of this expression against a concrete location, or 0 when it
    /// does not apply. Expressions shorter than the location apply to it as an
    /// ancestor.
    pub fn weight(&self, path: &DocPath) -> usize {
        if self.tokens.len() > path.len() {
            return 0;
        }
        let mut weight = 2;
        for (token, segment) in self.tokens[1..].iter().zip(path.segments()) {
            let w = match (token, segment) {
                (PathToken::Field(name), PathSegment::Field(actual)) if name == actual => 2,
                (PathToken::Index(i), PathSegment::Index(actual)) if i == actual => 2,
                (PathToken::Star, _) => 1,
                (PathToken::StarIndex, PathSegment::Index(_)) => 1,
                _ => 0,
            };
            weight *= w;
            if weight == 0 {
                return 0;
            }
        }
        weight
    }

    /// True when this expression addresses the location itself, not an ancestor.
    pub fn matches_exactly(&self, path: &DocPath) -> bool {
        self.tokens.len() == path.len() && self.weight(path) > 0
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn expect_char(chars: &[char], pos: usize, expected: char, text: &str) -> Result<(), PathError> {
    match chars.get(pos) {
        Some(c) if *c == expected => Ok(()),
        Some(c) => Err(PathError::new(
            text,
            format!("expected '{expected}' but found '{c}' at {pos}"),
        )),
        None => Err(PathError::new(text, format!("expected '{expected}' at end"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        let expr = PathExpression::parse("$.items[*].id").unwrap();
        assert_eq!(
            expr.tokens(),
            &[
                PathToken::Root,
                PathToken::Field("items".into()),
                PathToken::StarIndex,
                PathToken::Field("id".into())
            ]
        );

        let expr = PathExpression::parse("$['a b'][2].*").unwrap();
        assert_eq!(
            expr.tokens(),
            &[
                PathToken::Root,
                PathToken::Field("a b".into()),
                PathToken::Index(2),
                PathToken::Star
            ]
        );
    }

    #[test]
    fn test_empty_expression_is_root() {
        assert!(PathExpression::parse("").unwrap().is_root());
        assert!(PathExpression::parse("$").unwrap().is_root());
    }

    #[test]
    fn test_parse_errors() {
        assert!(PathExpression::parse("items").is_err());
        assert!(PathExpression::parse("$.").is_err());
        assert!(PathExpression::parse("$[abc]").is_err());
        assert!(PathExpression::parse("$['open").is_err());
        assert!(PathExpression::parse("$[1").is_err());
    }

    #[test]
    fn test_exact_index_outweighs_wildcard() {
        let path = DocPath::root().field("items").index(1);
        let star = PathExpression::parse("$.items[*]").unwrap();
        let exact = PathExpression::parse("$.items[1]").unwrap();
        let other = PathExpression::parse("$.items[0]").unwrap();
        assert!(exact.weight(&path) > star.weight(&path));
        assert!(star.weight(&path) > 0);
        assert_eq!(other.weight(&path), 0);
    }

    #[test]
    fn test_star_index_does_not_match_fields() {
        let path = DocPath::root().field("a").field("b");
        assert_eq!(PathExpression::parse("$.a[*]").unwrap().weight(&path), 0);
        assert!(PathExpression::parse("$.a.*").unwrap().weight(&path) > 0);
    }

    #[test]
    fn test_ancestor_applies_but_not_exactly() {
        let path = DocPath::root().field("items").index(0).field("id");
        let ancestor = PathExpression::parse("$.items").unwrap();
        assert!(ancestor.weight(&path) > 0);
        assert!(!ancestor.matches_exactly(&path));
        let longer = PathExpression::parse("$.items[0].id.x").unwrap();
        assert_eq!(longer.weight(&path), 0);
    }

    #[test]
    fn test_doc_path_display() {
        let path = DocPath::root().field("items").index(3).field("first name");
        assert_eq!(path.to_string(), "$.items[3]['first name']");
        assert_eq!(DocPath::root().to_string(), "$");
        assert!(path.to_expression().matches_exactly(&path));
    }
}
