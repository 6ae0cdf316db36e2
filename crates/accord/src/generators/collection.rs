//! Generators keyed by category and location, plus their pact JSON form.

use super::generator::{Generator, GeneratorError};
use crate::matchingrules::{Category, PathError, PathExpression};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// One generator bound to a key: a path expression for bodies, a name for
/// headers, query parameters and metadata, or empty for path and status.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorEntry {
    pub key: String,
    pub path: Option<PathExpression>,
    pub generator: Generator,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generators {
    categories: BTreeMap<Category, Vec<GeneratorEntry>>,
}

impl Generators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `generator` to `key`, replacing any generator already there.
    pub fn add(&mut self, category: Category, key: &str, generator: Generator) -> Result<(), PathError> {
        let path = if category.is_path_addressed() || key.trim_start().starts_with('$') {
            Some(PathExpression::parse(key)?)
        } else {
            None
        };
        let entries = self.categories.entry(category).or_default();
        let ignore_case = category == Category::Header;
        match entries.iter_mut().find(|e| {
            if ignore_case {
                e.key.eq_ignore_ascii_case(key)
            } else {
                e.key == key
            }
        }) {
            Some(entry) => entry.generator = generator,
            None => entries.push(GeneratorEntry {
                key: key.to_string(),
                path,
                generator,
            }),
        }
        Ok(())
    }

    pub fn for_category(&self, category: Category) -> &[GeneratorEntry] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &[GeneratorEntry])> {
        self.categories.iter().map(|(c, e)| (*c, e.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(Vec::is_empty)
    }

    /// Parse the `generators` object of a pact: per-category maps of key to
    /// generator, with path and status holding a single generator.
    pub fn from_json(value: &Value) -> Result<Self, GeneratorError> {
        let mut generators = Generators::new();
        let Some(obj) = value.as_object() else {
            return Ok(generators);
        };
        for (name, entries) in obj {
            let Some(category) = Category::from_name(name) else {
                warn!("Ignoring generators for unknown category '{}'", name);
                continue;
            };
            if entries.get("type").map(Value::is_string).unwrap_or(false) {
                generators.add(category, "", Generator::from_json(entries)?)?;
                continue;
            }
            let Some(entries) = entries.as_object() else {
                continue;
            };
            for (key, generator) in entries {
                match Generator::from_json(generator) {
                    Ok(generator) => generators.add(category, key, generator)?,
                    Err(GeneratorError::Unknown(kind)) => {
                        warn!("Ignoring unknown generator type '{}' at {}", kind, key);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(generators)
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (category, entries) in self.categories() {
            if entries.is_empty() {
                continue;
            }
            let single = matches!(category, Category::Path | Category::Method | Category::Status);
            let value = match (single, entries.first()) {
                (true, Some(entry)) => entry.generator.to_json(),
                _ => Value::Object(
                    entries
                        .iter()
                        .map(|e| (e.key.clone(), e.generator.to_json()))
                        .collect(),
                ),
            };
            obj.insert(category.name().to_string(), value);
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_replaces_same_key() {
        let mut generators = Generators::new();
        generators
            .add(Category::Header, "X-Id", Generator::RandomBoolean)
            .unwrap();
        generators
            .add(Category::Header, "x-id", Generator::random_string(4))
            .unwrap();
        let entries = generators.for_category(Category::Header);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].generator, Generator::random_string(4));
        assert!(entries[0].path.is_none());
    }

    #[test]
    fn test_body_keys_are_paths() {
        let mut generators = Generators::new();
        generators
            .add(Category::Body, "$.items[*].id", Generator::RandomBoolean)
            .unwrap();
        assert!(generators.for_category(Category::Body)[0].path.is_some());
        assert!(generators
            .add(Category::Body, "items[", Generator::RandomBoolean)
            .is_err());
    }

    #[test]
    fn test_json_layout() {
        let value = json!({
            "body": {"$.id": {"type": "RandomInt", "min": 1, "max": 5}},
            "header": {"X-Token": {"type": "Uuid"}},
            "path": {"type": "ProviderState", "expression": "/orders/${id}"},
            "status": {"type": "RandomInt", "min": 200, "max": 299}
        });
        let generators = Generators::from_json(&value).unwrap();
        assert_eq!(generators.for_category(Category::Body).len(), 1);
        assert_eq!(generators.for_category(Category::Header).len(), 1);
        assert_eq!(generators.for_category(Category::Path)[0].key, "");
        assert_eq!(generators.for_category(Category::Status).len(), 1);

        let reparsed = Generators::from_json(&generators.to_json()).unwrap();
        assert_eq!(reparsed, generators);
    }

    #[test]
    fn test_unknown_generator_types_are_skipped() {
        let generators = Generators::from_json(&json!({
            "body": {"$.a": {"type": "Hologram"}, "$.b": {"type": "RandomBoolean"}}
        }))
        .unwrap();
        assert_eq!(generators.for_category(Category::Body).len(), 1);
    }
}
