//! Putting the provider into the state an interaction expects.

use crate::model::ProviderState;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateChangeAction {
    Setup,
    Teardown,
}

#[derive(Debug, Error)]
pub enum StateChangeError {
    #[error("State change request for '{state}' failed: {reason}")]
    Request { state: String, reason: String },

    #[error("State change for '{state}' returned status {status}")]
    Status { state: String, status: u16 },

    #[error("Provider state '{state}' rejected: {reason}")]
    Rejected { state: String, reason: String },
}

/// Sets up and tears down provider states.
///
/// `set_up` returns the values the state binds; they feed provider state
/// generators for the interaction.
#[async_trait]
pub trait ProviderStateHandler: Send + Sync {
    async fn set_up(
        &self,
        state: &ProviderState,
    ) -> Result<BTreeMap<String, Value>, StateChangeError>;

    async fn tear_down(&self, _state: &ProviderState) -> Result<(), StateChangeError> {
        Ok(())
    }
}

/// Accepts every state and binds its declared parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateHandler;

#[async_trait]
impl ProviderStateHandler for NoopStateHandler {
    async fn set_up(
        &self,
        state: &ProviderState,
    ) -> Result<BTreeMap<String, Value>, StateChangeError> {
        Ok(state.params.clone())
    }
}

/// POSTs `{"state", "params", "action"}` to a provider endpoint.
///
/// A JSON object in the setup response is merged over the declared parameters.
#[derive(Debug, Clone)]
pub struct HttpStateChangeHandler {
    url: String,
    client: reqwest::Client,
    teardown: bool,
}

impl HttpStateChangeHandler {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, StateChangeError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StateChangeError::Request {
                state: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            url,
            client,
            teardown: false,
        })
    }

    /// Also call the endpoint with `"action": "teardown"` after each interaction.
    pub fn with_teardown(mut self, teardown: bool) -> Self {
        self.teardown = teardown;
        self
    }

    async fn post(
        &self,
        state: &ProviderState,
        action: StateChangeAction,
    ) -> Result<Option<Value>, StateChangeError> {
        debug!("State change {:?} for '{}' via {}", action, state.name, self.url);
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "state": state.name,
                "params": state.params,
                "action": action,
            }))
            .send()
            .await
            .map_err(|e| StateChangeError::Request {
                state: state.name.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StateChangeError::Status {
                state: state.name.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StateChangeError::Request {
                state: state.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(serde_json::from_slice(&bytes).ok())
    }
}

#[async_trait]
impl ProviderStateHandler for HttpStateChangeHandler {
    async fn set_up(
        &self,
        state: &ProviderState,
    ) -> Result<BTreeMap<String, Value>, StateChangeError> {
        let mut values = state.params.clone();
        match self.post(state, StateChangeAction::Setup).await? {
            Some(Value::Object(returned)) => values.extend(returned),
            Some(other) if !other.is_null() => {
                warn!(
                    "Ignoring non-object state change response for '{}'",
                    state.name
                );
            }
            _ => {}
        }
        Ok(values)
    }

    async fn tear_down(&self, state: &ProviderState) -> Result<(), StateChangeError> {
        if self.teardown {
            self.post(state, StateChangeAction::Teardown).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_binds_declared_params() {
        let state = ProviderState::new("user exists").with_param("id", json!(7));
        let values = NoopStateHandler.set_up(&state).await.unwrap();
        assert_eq!(values["id"], json!(7));
        assert!(NoopStateHandler.tear_down(&state).await.is_ok());
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(StateChangeAction::Teardown).unwrap(),
            json!("teardown")
        );
    }
}
