//! Producing actual messages for message interactions.

use super::client::TransportError;
use crate::model::{Message, MessageInteraction};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Produces the message the provider would publish for an interaction.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn produce(
        &self,
        interaction: &MessageInteraction,
        provider_state: &BTreeMap<String, Value>,
    ) -> Result<Message, TransportError>;
}

#[async_trait]
impl<F> MessageProducer for F
where
    F: Fn(&MessageInteraction, &BTreeMap<String, Value>) -> Result<Message, TransportError>
        + Send
        + Sync,
{
    async fn produce(
        &self,
        interaction: &MessageInteraction,
        provider_state: &BTreeMap<String, Value>,
    ) -> Result<Message, TransportError> {
        self(interaction, provider_state)
    }
}
