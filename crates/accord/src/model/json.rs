//! Pact documents as JSON, for every specification version.
//!
//! Versions differ mainly in layout: V2 keeps matching rules in a flat
//! `$.body.x` map and allows one provider state, V3 nests rules and generators
//! per category and allows several provider states, and V4 tags each
//! interaction with a type and wraps bodies in a `content` object.

use super::body::OptionalBody;
use super::content_type::ContentType;
use super::http::{HttpRequest, HttpResponse};
use super::interaction::{HttpInteraction, Interaction, MessageInteraction, ProviderState};
use super::message::Message;
use super::multimap::MultiValueMap;
use super::pact::{Pact, PactError, PactSpecVersion};
use crate::generators::Generators;
use crate::matchingrules::{
    matching_rules_from_json, matching_rules_from_v2, matching_rules_to_json, matching_rules_to_v2,
    MatchingRules,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const V4_HTTP: &str = "Synchronous/HTTP";
const V4_MESSAGE: &str = "Asynchronous/Messages";

fn invalid(message: impl Into<String>) -> PactError {
    PactError::InvalidDocument(message.into())
}

fn party_name(root: &Map<String, Value>, party: &str) -> Result<String, PactError> {
    root.get(party)
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("missing {party} name")))
}

fn spec_version(root: &Map<String, Value>) -> PactSpecVersion {
    let metadata = root.get("metadata");
    let declared = metadata
        .and_then(|m| {
            m.get("pactSpecification")
                .or_else(|| m.get("pact-specification"))
                .and_then(|s| s.get("version"))
                .or_else(|| m.get("pactSpecificationVersion"))
        })
        .and_then(Value::as_str)
        .and_then(PactSpecVersion::parse);
    let tagged = root
        .get("interactions")
        .and_then(Value::as_array)
        .map(|items| items.iter().any(|i| i.get("type").is_some()))
        .unwrap_or(false);
    match declared {
        Some(version) => version,
        None if tagged => PactSpecVersion::V4,
        None => PactSpecVersion::V3,
    }
}

// ============================================================================
// Reading
// ============================================================================

fn multimap_from_json(value: Option<&Value>) -> MultiValueMap {
    let mut map = MultiValueMap::new();
    match value {
        Some(Value::Object(obj)) => {
            for (key, values) in obj {
                match values {
                    Value::Array(items) => {
                        for item in items {
                            map.insert(key.as_str(), plain(item));
                        }
                    }
                    other => map.insert(key.as_str(), plain(other)),
                }
            }
        }
        Some(Value::String(query)) => return MultiValueMap::from_query_string(query),
        _ => {}
    }
    map
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_json_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(ContentType::parse)
        .map(|c| c.is_json())
        .unwrap_or(false)
}

/// `body` for V1 to V3, where JSON content is inlined and anything else is a string.
fn body_from_json(value: Option<&Value>, content_type: Option<&str>) -> OptionalBody {
    match value {
        None => OptionalBody::Missing,
        Some(Value::Null) => OptionalBody::Null,
        Some(Value::String(s)) if s.is_empty() => OptionalBody::Empty,
        Some(Value::String(s)) if !is_json_type(content_type) => {
            OptionalBody::present(s.clone(), content_type.map(str::to_string))
        }
        Some(other) => OptionalBody::present(
            other.to_string(),
            Some(content_type.unwrap_or("application/json").to_string()),
        ),
    }
}

/// `body` for V4: `{"content": ..., "contentType": ..., "encoded": false | "base64"}`.
fn body_from_v4(value: Option<&Value>, header_type: Option<&str>) -> Result<OptionalBody, PactError> {
    let Some(Value::Object(body)) = value else {
        return Ok(body_from_json(value, header_type));
    };
    let content_type = body
        .get("contentType")
        .and_then(Value::as_str)
        .or(header_type)
        .map(str::to_string);
    let encoded = body
        .get("encoded")
        .map(|e| match e {
            Value::String(s) => s.to_ascii_lowercase(),
            _ => String::new(),
        })
        .unwrap_or_default();

    match body.get("content") {
        None => Ok(OptionalBody::Missing),
        Some(Value::Null) => Ok(OptionalBody::Null),
        Some(Value::String(s)) if s.is_empty() => Ok(OptionalBody::Empty),
        Some(Value::String(s)) if encoded == "base64" => {
            let bytes = BASE64
                .decode(s)
                .map_err(|e| invalid(format!("bad base64 body: {e}")))?;
            Ok(OptionalBody::present(bytes, content_type))
        }
        Some(Value::String(s)) if encoded == "json" => {
            Ok(OptionalBody::present(s.clone(), content_type))
        }
        Some(Value::String(s)) if !is_json_type(content_type.as_deref()) => {
            Ok(OptionalBody::present(s.clone(), content_type))
        }
        Some(other) => Ok(OptionalBody::present(
            other.to_string(),
            content_type.or_else(|| Some("application/json".to_string())),
        )),
    }
}

fn rules_from_json(
    container: &Map<String, Value>,
    version: PactSpecVersion,
) -> Result<MatchingRules, PactError> {
    let Some(value) = container.get("matchingRules") else {
        return Ok(MatchingRules::default());
    };
    let flat = value
        .as_object()
        .map(|obj| obj.keys().any(|k| k.starts_with('$')))
        .unwrap_or(false);
    if version <= PactSpecVersion::V2 || flat {
        Ok(matching_rules_from_v2(value)?)
    } else {
        Ok(matching_rules_from_json(value)?)
    }
}

fn generators_from_json(container: &Map<String, Value>) -> Result<Generators, PactError> {
    match container.get("generators") {
        Some(value) => Ok(Generators::from_json(value)?),
        None => Ok(Generators::default()),
    }
}

fn provider_states_from_json(interaction: &Map<String, Value>) -> Result<Vec<ProviderState>, PactError> {
    if let Some(states) = interaction.get("providerStates") {
        return Ok(serde_json::from_value(states.clone())?);
    }
    Ok(interaction
        .get("providerState")
        .or_else(|| interaction.get("provider_state"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|name| vec![ProviderState::new(name)])
        .unwrap_or_default())
}

fn object<'a>(value: Option<&'a Value>, what: &str) -> Result<&'a Map<String, Value>, PactError> {
    value
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("{what} must be an object")))
}

fn request_from_json(value: &Map<String, Value>, version: PactSpecVersion) -> Result<HttpRequest, PactError> {
    let headers = multimap_from_json(value.get("headers"));
    let content_type = headers.first_ignore_case("content-type").map(str::to_string);
    let body = if version >= PactSpecVersion::V4 {
        body_from_v4(value.get("body"), content_type.as_deref())?
    } else {
        body_from_json(value.get("body"), content_type.as_deref())
    };
    Ok(HttpRequest {
        method: value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase(),
        path: value
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("/")
            .to_string(),
        query: multimap_from_json(value.get("query")),
        headers,
        body,
        matching_rules: rules_from_json(value, version)?,
        generators: generators_from_json(value)?,
    })
}

fn response_from_json(value: &Map<String, Value>, version: PactSpecVersion) -> Result<HttpResponse, PactError> {
    let headers = multimap_from_json(value.get("headers"));
    let content_type = headers.first_ignore_case("content-type").map(str::to_string);
    let body = if version >= PactSpecVersion::V4 {
        body_from_v4(value.get("body"), content_type.as_deref())?
    } else {
        body_from_json(value.get("body"), content_type.as_deref())
    };
    let status = value.get("status").and_then(Value::as_u64).unwrap_or(200);
    let status = u16::try_from(status)
        .ok()
        .filter(|s| *s > 0)
        .ok_or_else(|| invalid(format!("invalid status {status}")))?;
    Ok(HttpResponse {
        status,
        headers,
        body,
        matching_rules: rules_from_json(value, version)?,
        generators: generators_from_json(value)?,
    })
}

fn http_interaction_from_json(
    value: &Map<String, Value>,
    version: PactSpecVersion,
) -> Result<HttpInteraction, PactError> {
    Ok(HttpInteraction {
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        provider_states: provider_states_from_json(value)?,
        request: request_from_json(object(value.get("request"), "request")?, version)?,
        response: response_from_json(object(value.get("response"), "response")?, version)?,
    })
}

fn message_from_json(
    value: &Map<String, Value>,
    version: PactSpecVersion,
) -> Result<MessageInteraction, PactError> {
    let metadata: std::collections::BTreeMap<String, Value> = value
        .get("metadata")
        .or_else(|| value.get("metaData"))
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let content_type = metadata
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("contentType") || k.eq_ignore_ascii_case("content-type"))
        .and_then(|(_, v)| v.as_str())
        .map(str::to_string);
    let contents = if version >= PactSpecVersion::V4 {
        body_from_v4(value.get("contents"), content_type.as_deref())?
    } else {
        body_from_json(value.get("contents"), content_type.as_deref())
    };

    Ok(MessageInteraction {
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        provider_states: provider_states_from_json(value)?,
        message: Message {
            contents,
            metadata,
            matching_rules: rules_from_json(value, version)?,
            generators: generators_from_json(value)?,
        },
    })
}

// ============================================================================
// Writing
// ============================================================================

fn multimap_to_json(map: &MultiValueMap, version: PactSpecVersion) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, values)| {
                let value = if version >= PactSpecVersion::V4 {
                    json!(values)
                } else {
                    Value::String(values.join(", "))
                };
                (k.to_string(), value)
            })
            .collect(),
    )
}

fn query_to_json(query: &MultiValueMap, version: PactSpecVersion) -> Value {
    if version <= PactSpecVersion::V2 {
        Value::String(query.to_query_string())
    } else {
        Value::Object(query.iter().map(|(k, v)| (k.to_string(), json!(v))).collect())
    }
}

fn body_to_json(body: &OptionalBody, content_type: Option<ContentType>) -> Option<Value> {
    match body {
        OptionalBody::Missing => None,
        OptionalBody::Empty => Some(Value::String(String::new())),
        OptionalBody::Null => Some(Value::Null),
        OptionalBody::Present { .. } => {
            let is_json = content_type.as_ref().map(ContentType::is_json).unwrap_or(false);
            match body.as_json().filter(|_| is_json) {
                Some(value) => Some(value),
                None => Some(Value::String(body.as_str_lossy().into_owned())),
            }
        }
    }
}

fn body_to_v4(body: &OptionalBody, content_type: Option<ContentType>) -> Option<Value> {
    let type_name = content_type.as_ref().map(|c| c.to_string());
    match body {
        OptionalBody::Missing => None,
        OptionalBody::Empty => Some(json!({"content": ""})),
        OptionalBody::Null => Some(json!({"content": null})),
        OptionalBody::Present { bytes, .. } => {
            let is_json = content_type.as_ref().map(ContentType::is_json).unwrap_or(false);
            let mut obj = Map::new();
            match (body.as_json().filter(|_| is_json), std::str::from_utf8(bytes)) {
                (Some(value), _) => {
                    obj.insert("content".to_string(), value);
                    obj.insert("encoded".to_string(), Value::Bool(false));
                }
                (None, Ok(text)) => {
                    obj.insert("content".to_string(), Value::String(text.to_string()));
                    obj.insert("encoded".to_string(), Value::Bool(false));
                }
                (None, Err(_)) => {
                    obj.insert("content".to_string(), Value::String(BASE64.encode(bytes)));
                    obj.insert("encoded".to_string(), Value::String("base64".to_string()));
                }
            }
            if let Some(type_name) = type_name {
                obj.insert("contentType".to_string(), Value::String(type_name));
            }
            Some(Value::Object(obj))
        }
    }
}

fn insert_body(
    obj: &mut Map<String, Value>,
    key: &str,
    body: &OptionalBody,
    content_type: Option<ContentType>,
    version: PactSpecVersion,
) {
    let value = if version >= PactSpecVersion::V4 {
        body_to_v4(body, content_type)
    } else {
        body_to_json(body, content_type)
    };
    if let Some(value) = value {
        obj.insert(key.to_string(), value);
    }
}

fn insert_rules(
    obj: &mut Map<String, Value>,
    rules: &MatchingRules,
    generators: &Generators,
    version: PactSpecVersion,
) {
    if !rules.is_empty() {
        match version {
            PactSpecVersion::V1 | PactSpecVersion::V1_1 => {}
            PactSpecVersion::V2 => {
                obj.insert("matchingRules".to_string(), matching_rules_to_v2(rules));
            }
            _ => {
                obj.insert("matchingRules".to_string(), matching_rules_to_json(rules));
            }
        }
    }
    if !generators.is_empty() && version >= PactSpecVersion::V3 {
        obj.insert("generators".to_string(), generators.to_json());
    }
}

fn insert_provider_states(obj: &mut Map<String, Value>, states: &[ProviderState], version: PactSpecVersion) {
    if states.is_empty() {
        return;
    }
    if version >= PactSpecVersion::V3 {
        obj.insert("providerStates".to_string(), json!(states));
    } else {
        if states.len() > 1 {
            warn!(
                "Only the first of {} provider states can be written for version {}",
                states.len(),
                version
            );
        }
        obj.insert("providerState".to_string(), Value::String(states[0].name.clone()));
    }
}

fn request_to_json(request: &HttpRequest, version: PactSpecVersion) -> Value {
    let mut obj = Map::new();
    obj.insert("method".to_string(), Value::String(request.method.to_uppercase()));
    obj.insert("path".to_string(), Value::String(request.path.clone()));
    if !request.query.is_empty() {
        obj.insert("query".to_string(), query_to_json(&request.query, version));
    }
    if !request.headers.is_empty() {
        obj.insert("headers".to_string(), multimap_to_json(&request.headers, version));
    }
    insert_body(&mut obj, "body", &request.body, request.content_type(), version);
    insert_rules(&mut obj, &request.matching_rules, &request.generators, version);
    Value::Object(obj)
}

fn response_to_json(response: &HttpResponse, version: PactSpecVersion) -> Value {
    let mut obj = Map::new();
    obj.insert("status".to_string(), Value::from(response.status));
    if !response.headers.is_empty() {
        obj.insert("headers".to_string(), multimap_to_json(&response.headers, version));
    }
    insert_body(&mut obj, "body", &response.body, response.content_type(), version);
    insert_rules(&mut obj, &response.matching_rules, &response.generators, version);
    Value::Object(obj)
}

fn http_interaction_to_json(interaction: &HttpInteraction, version: PactSpecVersion) -> Value {
    let mut obj = Map::new();
    if version >= PactSpecVersion::V4 {
        obj.insert("type".to_string(), Value::String(V4_HTTP.to_string()));
    }
    obj.insert(
        "description".to_string(),
        Value::String(interaction.description.clone()),
    );
    insert_provider_states(&mut obj, &interaction.provider_states, version);
    obj.insert("request".to_string(), request_to_json(&interaction.request, version));
    obj.insert("response".to_string(), response_to_json(&interaction.response, version));
    Value::Object(obj)
}

fn message_to_json(interaction: &MessageInteraction, version: PactSpecVersion) -> Value {
    let message = &interaction.message;
    let mut obj = Map::new();
    if version >= PactSpecVersion::V4 {
        obj.insert("type".to_string(), Value::String(V4_MESSAGE.to_string()));
    }
    obj.insert(
        "description".to_string(),
        Value::String(interaction.description.clone()),
    );
    insert_provider_states(&mut obj, &interaction.provider_states, version);
    insert_body(&mut obj, "contents", &message.contents, message.content_type(), version);
    if !message.metadata.is_empty() {
        obj.insert("metadata".to_string(), json!(message.metadata));
    }
    insert_rules(&mut obj, &message.matching_rules, &message.generators, version);
    Value::Object(obj)
}

impl Pact {
    /// Parse a pact document of any supported version.
    pub fn from_json(value: &Value) -> Result<Pact, PactError> {
        let root = value
            .as_object()
            .ok_or_else(|| invalid("a pact must be a JSON object"))?;
        let version = spec_version(root);
        let mut pact = Pact::new(party_name(root, "consumer")?, party_name(root, "provider")?)
            .with_spec_version(version);

        if let Some(Value::Object(metadata)) = root.get("metadata") {
            pact.metadata = metadata
                .iter()
                .filter(|(k, _)| !is_spec_key(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }

        for item in root
            .get("interactions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let interaction = object(Some(item), "interaction")?;
            let kind = interaction.get("type").and_then(Value::as_str);
            match kind {
                Some(V4_MESSAGE) => pact
                    .interactions
                    .push(message_from_json(interaction, version)?.into()),
                Some(V4_HTTP) | None => pact
                    .interactions
                    .push(http_interaction_from_json(interaction, version)?.into()),
                Some(other) => warn!("Skipping interaction of unsupported type '{}'", other),
            }
        }

        for item in root
            .get("messages")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let message = object(Some(item), "message")?;
            pact.interactions
                .push(message_from_json(message, version)?.into());
        }

        debug!(
            "Loaded pact {} -> {} ({} interactions, version {})",
            pact.consumer,
            pact.provider,
            pact.interactions.len(),
            version
        );
        Ok(pact)
    }

    pub fn parse(text: &str) -> Result<Pact, PactError> {
        let value: Value = serde_json::from_str(text)?;
        Pact::from_json(&value)
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Pact, PactError> {
        let text = fs::read_to_string(path.as_ref())?;
        Pact::parse(&text)
    }

    /// Render in this pact's own specification version.
    pub fn to_json(&self) -> Value {
        self.to_json_version(self.spec_version)
    }

    pub fn to_json_version(&self, version: PactSpecVersion) -> Value {
        let mut root = Map::new();
        root.insert("consumer".to_string(), json!({"name": self.consumer}));
        root.insert("provider".to_string(), json!({"name": self.provider}));

        let http: Vec<Value> = self
            .http_interactions()
            .map(|i| http_interaction_to_json(i, version))
            .collect();
        let messages: Vec<Value> = self
            .message_interactions()
            .map(|i| message_to_json(i, version))
            .collect();

        if version >= PactSpecVersion::V4 {
            let all = self
                .interactions
                .iter()
                .map(|i| match i {
                    Interaction::Http(h) => http_interaction_to_json(h, version),
                    Interaction::Message(m) => message_to_json(m, version),
                })
                .collect();
            root.insert("interactions".to_string(), Value::Array(all));
        } else {
            if !http.is_empty() || messages.is_empty() {
                root.insert("interactions".to_string(), Value::Array(http));
            }
            if !messages.is_empty() {
                root.insert("messages".to_string(), Value::Array(messages));
            }
        }

        let mut metadata: Map<String, Value> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        metadata.insert(
            "pactSpecification".to_string(),
            json!({"version": version.as_str()}),
        );
        metadata.insert(
            "accord".to_string(),
            json!({"version": env!("CARGO_PKG_VERSION")}),
        );
        root.insert("metadata".to_string(), Value::Object(metadata));
        Value::Object(root)
    }

    /// Write the pact, merging into an existing file for the same parties.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), PactError> {
        let path = path.as_ref();
        let mut merged = self.clone();
        if path.exists() {
            let mut existing = Pact::read_file(path)?;
            let added = existing.merge_pact(self)?;
            info!(
                "Merged {} new interaction(s) into {}",
                added,
                path.display()
            );
            merged = existing;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&merged.to_json())?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn is_spec_key(key: &str) -> bool {
    matches!(
        key,
        "pactSpecification" | "pact-specification" | "pactSpecificationVersion" | "accord"
    )
}
