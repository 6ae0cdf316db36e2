//! Interactions and the provider states they depend on.

use super::http::{HttpRequest, HttpResponse};
use super::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named precondition the provider must be placed into.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProviderState {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ProviderState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// One request/response pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpInteraction {
    pub description: String,
    pub provider_states: Vec<ProviderState>,
    pub request: HttpRequest,
    pub response: HttpResponse,
}

impl HttpInteraction {
    pub fn new(description: impl Into<String>, request: HttpRequest, response: HttpResponse) -> Self {
        Self {
            description: description.into(),
            provider_states: Vec::new(),
            request,
            response,
        }
    }

    pub fn given(mut self, state: ProviderState) -> Self {
        self.provider_states.push(state);
        self
    }
}

/// One expected asynchronous message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageInteraction {
    pub description: String,
    pub provider_states: Vec<ProviderState>,
    pub message: Message,
}

impl MessageInteraction {
    pub fn new(description: impl Into<String>, message: Message) -> Self {
        Self {
            description: description.into(),
            provider_states: Vec::new(),
            message,
        }
    }

    pub fn given(mut self, state: ProviderState) -> Self {
        self.provider_states.push(state);
        self
    }
}

/// An entry in a pact's interaction list.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Http(HttpInteraction),
    Message(MessageInteraction),
}

impl Interaction {
    pub fn description(&self) -> &str {
        match self {
            Interaction::Http(i) => &i.description,
            Interaction::Message(i) => &i.description,
        }
    }

    pub fn provider_states(&self) -> &[ProviderState] {
        match self {
            Interaction::Http(i) => &i.provider_states,
            Interaction::Message(i) => &i.provider_states,
        }
    }

    pub fn as_http(&self) -> Option<&HttpInteraction> {
        match self {
            Interaction::Http(i) => Some(i),
            Interaction::Message(_) => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageInteraction> {
        match self {
            Interaction::Message(i) => Some(i),
            Interaction::Http(_) => None,
        }
    }
}

impl From<HttpInteraction> for Interaction {
    fn from(value: HttpInteraction) -> Self {
        Interaction::Http(value)
    }
}

impl From<MessageInteraction> for Interaction {
    fn from(value: MessageInteraction) -> Self {
        Interaction::Message(value)
    }
}
