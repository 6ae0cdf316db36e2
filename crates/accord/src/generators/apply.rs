//! Producing concrete requests, responses and messages from expectations.
//!
//! The expectation is never mutated; each call returns a generated copy.

use super::collection::{GeneratorEntry, Generators};
use super::context::GeneratorContext;
use super::generator::GeneratorError;
use crate::matchingrules::{Category, PathToken};
use crate::model::{ContentType, HttpRequest, HttpResponse, Message, MultiValueMap, OptionalBody};
use rand::Rng;
use serde_json::Value;
use tracing::debug;

fn active<'a>(
    generators: &'a Generators,
    category: Category,
    ctx: &'a GeneratorContext,
) -> impl Iterator<Item = &'a GeneratorEntry> {
    generators
        .for_category(category)
        .iter()
        .filter(move |e| e.generator.applies_to(ctx.mode))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn visit<F>(value: &mut Value, tokens: &[PathToken], f: &mut F) -> Result<(), GeneratorError>
where
    F: FnMut(&mut Value) -> Result<(), GeneratorError>,
{
    let Some((token, rest)) = tokens.split_first() else {
        return f(value);
    };
    match (token, value) {
        (PathToken::Root, value) => visit(value, rest, f),
        (PathToken::Field(name), Value::Object(map)) => match map.get_mut(name) {
            Some(child) => visit(child, rest, f),
            None => Ok(()),
        },
        (PathToken::Index(index), Value::Array(items)) => match items.get_mut(*index) {
            Some(child) => visit(child, rest, f),
            None => Ok(()),
        },
        (PathToken::Star, Value::Object(map)) => {
            map.values_mut().try_for_each(|child| visit(child, rest, &mut *f))
        }
        (PathToken::Star | PathToken::StarIndex, Value::Array(items)) => {
            items.iter_mut().try_for_each(|child| visit(child, rest, &mut *f))
        }
        _ => Ok(()),
    }
}

fn generate_values<R: Rng>(
    entry: &GeneratorEntry,
    existing: Option<&[String]>,
    ctx: &GeneratorContext,
    rng: &mut R,
) -> Result<Vec<String>, GeneratorError> {
    let count = existing.map(|v| v.len()).unwrap_or(0).max(1);
    (0..count)
        .map(|_| entry.generator.generate(ctx, &mut *rng).map(|v| as_text(&v)))
        .collect()
}

fn generate_headers<R: Rng>(
    headers: &mut MultiValueMap,
    generators: &Generators,
    ctx: &GeneratorContext,
    rng: &mut R,
) -> Result<(), GeneratorError> {
    for entry in active(generators, Category::Header, ctx) {
        let values = generate_values(entry, headers.get_ignore_case(&entry.key), ctx, rng)?;
        debug!("Generated header {} with {}", entry.key, entry.generator.name());
        headers.set_ignore_case(entry.key.clone(), values);
    }
    Ok(())
}

fn generate_body<R: Rng>(
    body: &OptionalBody,
    content_type: Option<ContentType>,
    generators: &Generators,
    ctx: &GeneratorContext,
    rng: &mut R,
) -> Result<OptionalBody, GeneratorError> {
    let entries: Vec<&GeneratorEntry> = active(generators, Category::Body, ctx).collect();
    if entries.is_empty() || !(body.is_present() || matches!(body, OptionalBody::Null)) {
        return Ok(body.clone());
    }
    let declared = body.declared_content_type().map(str::to_string);

    let is_json = content_type.as_ref().map(ContentType::is_json).unwrap_or(false);
    if let Some(mut document) = body.as_json().filter(|_| is_json) {
        for entry in entries {
            let Some(path) = &entry.path else {
                continue;
            };
            let mut replace = |slot: &mut Value| {
                *slot = entry.generator.generate(ctx, &mut *rng)?;
                Ok(())
            };
            visit(&mut document, path.tokens(), &mut replace)?;
            debug!("Generated body {} with {}", path, entry.generator.name());
        }
        return Ok(OptionalBody::present(
            document.to_string(),
            declared.or_else(|| Some("application/json".to_string())),
        ));
    }

    let mut generated = body.clone();
    for entry in entries {
        match &entry.path {
            Some(path) if path.is_root() => {
                let value = entry.generator.generate(ctx, rng)?;
                generated = OptionalBody::present(as_text(&value), declared.clone());
            }
            _ => debug!(
                "Skipping body generator at {} for a non-JSON body",
                entry.key
            ),
        }
    }
    Ok(generated)
}

/// Concrete request for an expectation, using a fresh RNG from the context.
pub fn generate_request(request: &HttpRequest, ctx: &GeneratorContext) -> Result<HttpRequest, GeneratorError> {
    generate_request_with_rng(request, ctx, &mut ctx.rng())
}

pub fn generate_request_with_rng<R: Rng>(
    request: &HttpRequest,
    ctx: &GeneratorContext,
    rng: &mut R,
) -> Result<HttpRequest, GeneratorError> {
    let generators = &request.generators;
    let mut generated = request.clone();
    if generators.is_empty() {
        return Ok(generated);
    }

    if let Some(entry) = active(generators, Category::Path, ctx).next() {
        generated.path = as_text(&entry.generator.generate(ctx, rng)?);
    }
    for entry in active(generators, Category::Query, ctx) {
        let values = generate_values(entry, request.query.get(&entry.key), ctx, rng)?;
        generated.query.set(entry.key.clone(), values);
    }
    generate_headers(&mut generated.headers, generators, ctx, rng)?;
    generated.body = generate_body(&request.body, request.content_type(), generators, ctx, rng)?;
    Ok(generated)
}

pub fn generate_response(response: &HttpResponse, ctx: &GeneratorContext) -> Result<HttpResponse, GeneratorError> {
    generate_response_with_rng(response, ctx, &mut ctx.rng())
}

pub fn generate_response_with_rng<R: Rng>(
    response: &HttpResponse,
    ctx: &GeneratorContext,
    rng: &mut R,
) -> Result<HttpResponse, GeneratorError> {
    let generators = &response.generators;
    let mut generated = response.clone();
    if generators.is_empty() {
        return Ok(generated);
    }

    if let Some(entry) = active(generators, Category::Status, ctx).next() {
        let value = entry.generator.generate(ctx, rng)?;
        let status = match &value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse::<u64>().ok(),
            _ => None,
        }
        .filter(|s| (100..=599).contains(s))
        .ok_or_else(|| GeneratorError::InvalidStatus {
            value: as_text(&value),
        })?;
        generated.status = status as u16;
    }
    generate_headers(&mut generated.headers, generators, ctx, rng)?;
    generated.body = generate_body(&response.body, response.content_type(), generators, ctx, rng)?;
    Ok(generated)
}

pub fn generate_message(message: &Message, ctx: &GeneratorContext) -> Result<Message, GeneratorError> {
    let generators = &message.generators;
    let mut generated = message.clone();
    if generators.is_empty() {
        return Ok(generated);
    }
    let mut rng = ctx.rng();

    for entry in active(generators, Category::Metadata, ctx) {
        let value = entry.generator.generate(ctx, &mut rng)?;
        generated.metadata.insert(entry.key.clone(), value);
    }
    generated.contents = generate_body(
        &message.contents,
        message.content_type(),
        generators,
        ctx,
        &mut rng,
    )?;
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::Generator;
    use serde_json::json;

    fn seeded() -> GeneratorContext {
        GeneratorContext::consumer().with_seed(Some(11))
    }

    #[test]
    fn test_body_generators_follow_paths() {
        let request = HttpRequest::new("POST", "/orders")
            .with_json_body(json!({"id": 0, "lines": [{"sku": "a"}, {"sku": "b"}], "note": "keep"}))
            .with_generator(Category::Body, "$.id", Generator::RandomInt { min: 10, max: 20 })
            .unwrap()
            .with_generator(Category::Body, "$.lines[*].sku", Generator::regex("[A-Z]{3}"))
            .unwrap();

        let generated = generate_request(&request, &seeded()).unwrap();
        let body = generated.body.as_json().unwrap();
        let id = body["id"].as_i64().unwrap();
        assert!((10..=20).contains(&id));
        for line in body["lines"].as_array().unwrap() {
            let sku = line["sku"].as_str().unwrap();
            assert_eq!(sku.len(), 3);
            assert!(sku.chars().all(|c| c.is_ascii_uppercase()));
        }
        assert_eq!(body["note"], "keep");
        assert_eq!(request.body.as_json().unwrap()["id"], 0);
    }

    #[test]
    fn test_same_seed_same_request() {
        let request = HttpRequest::new("GET", "/")
            .with_header("X-Id", "placeholder")
            .with_generator(Category::Header, "X-Id", Generator::random_string(16))
            .unwrap()
            .with_generator(Category::Query, "q", Generator::RandomHexadecimal { digits: 6 })
            .unwrap();
        let a = generate_request(&request, &seeded()).unwrap();
        let b = generate_request(&request, &seeded()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.headers.get("X-Id").unwrap()[0].len(), 16);
        assert_eq!(a.query.get("q").unwrap()[0].len(), 6);
    }

    #[test]
    fn test_path_from_provider_state_only_in_provider_mode() {
        let request = HttpRequest::new("GET", "/orders/1")
            .with_generator(
                Category::Path,
                "",
                Generator::ProviderStateValue {
                    expression: "/orders/${id}".to_string(),
                },
            )
            .unwrap();

        let consumer = generate_request(&request, &GeneratorContext::consumer()).unwrap();
        assert_eq!(consumer.path, "/orders/1");

        let provider_ctx = GeneratorContext::provider().with_param("id", json!(77));
        let provider = generate_request(&request, &provider_ctx).unwrap();
        assert_eq!(provider.path, "/orders/77");

        let err = generate_request(&request, &GeneratorContext::provider()).unwrap_err();
        assert!(matches!(err, GeneratorError::MissingContextValue { .. }));
    }

    #[test]
    fn test_status_generator() {
        let response = HttpResponse::new(200)
            .with_generator(Category::Status, "", Generator::RandomInt { min: 201, max: 204 })
            .unwrap();
        let generated = generate_response(&response, &seeded()).unwrap();
        assert!((201..=204).contains(&generated.status));

        let bad = HttpResponse::new(200)
            .with_generator(Category::Status, "", Generator::RandomInt { min: 1000, max: 1001 })
            .unwrap();
        assert!(matches!(
            generate_response(&bad, &seeded()),
            Err(GeneratorError::InvalidStatus { .. })
        ));
    }

    #[test]
    fn test_mock_server_url_in_response_body() {
        let response = HttpResponse::new(200)
            .with_json_body(json!({"next": "http://localhost:8080/page/2"}))
            .with_generator(
                Category::Body,
                "$.next",
                Generator::MockServerUrl {
                    example: "http://localhost:8080/page/2".to_string(),
                    regex: ".*(/page/\\d+)$".to_string(),
                },
            )
            .unwrap();
        let ctx = GeneratorContext::consumer().with_mock_server_url("http://127.0.0.1:5000");
        let generated = generate_response(&response, &ctx).unwrap();
        assert_eq!(
            generated.body.as_json().unwrap()["next"],
            "http://127.0.0.1:5000/page/2"
        );
    }

    #[test]
    fn test_text_body_root_generator() {
        let response = HttpResponse::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body(OptionalBody::text("token"))
            .with_generator(Category::Body, "$", Generator::random_string(8))
            .unwrap();
        let generated = generate_response(&response, &seeded()).unwrap();
        assert_eq!(generated.body.bytes().len(), 8);
        assert_eq!(generated.body.declared_content_type(), Some("text/plain"));
    }

    #[test]
    fn test_message_metadata_and_contents() {
        let message = Message::json(json!({"id": "x"}))
            .with_metadata("key", json!("k"))
            .with_generator(Category::Metadata, "key", Generator::Uuid { format: Default::default() })
            .unwrap()
            .with_generator(Category::Body, "$.id", Generator::RandomBoolean)
            .unwrap();
        let generated = generate_message(&message, &seeded()).unwrap();
        assert_eq!(generated.metadata["key"].as_str().unwrap().len(), 36);
        assert!(generated.contents.as_json().unwrap()["id"].is_boolean());
    }
}
