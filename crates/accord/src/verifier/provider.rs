//! ProviderVerifier - replays a pact against the real provider.

use super::client::ProviderClient;
use super::message::MessageProducer;
use super::report::{InteractionResult, VerificationReport};
use super::state_change::{NoopStateHandler, ProviderStateHandler};
use crate::generators::{
    generate_message, generate_request_with_rng, generate_response_with_rng, GeneratorContext,
};
use crate::matching::{match_message_with_rules, match_response_with_rules, MatchOptions};
use crate::model::{HttpInteraction, Interaction, MessageInteraction, Pact, ProviderState};
use crate::verification::{FailureCause, VerificationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VerifierOptions {
    /// Seed for random generators, for reproducible requests.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Tolerate keys in actual JSON objects that the expectation does not name.
    #[serde(default)]
    pub allow_unexpected_keys: bool,
    /// Only verify interactions whose description contains this text.
    #[serde(default)]
    pub description_filter: Option<String>,
    /// Only verify interactions with a provider state containing this text.
    #[serde(default)]
    pub state_filter: Option<String>,
}

impl VerifierOptions {
    fn selects(&self, interaction: &Interaction) -> bool {
        let description_ok = self
            .description_filter
            .as_deref()
            .map_or(true, |f| interaction.description().contains(f));
        let state_ok = self.state_filter.as_deref().map_or(true, |f| {
            interaction
                .provider_states()
                .iter()
                .any(|s| s.name.contains(f))
        });
        description_ok && state_ok
    }

    fn match_options(&self) -> MatchOptions {
        MatchOptions {
            allow_unexpected_keys: self.allow_unexpected_keys,
        }
    }
}

pub struct ProviderVerifier {
    client: Arc<dyn ProviderClient>,
    state_handler: Arc<dyn ProviderStateHandler>,
    message_producer: Option<Arc<dyn MessageProducer>>,
    options: VerifierOptions,
}

impl ProviderVerifier {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self {
            client,
            state_handler: Arc::new(NoopStateHandler),
            message_producer: None,
            options: VerifierOptions::default(),
        }
    }

    pub fn with_state_handler(mut self, handler: Arc<dyn ProviderStateHandler>) -> Self {
        self.state_handler = handler;
        self
    }

    pub fn with_message_producer(mut self, producer: Arc<dyn MessageProducer>) -> Self {
        self.message_producer = Some(producer);
        self
    }

    pub fn with_options(mut self, options: VerifierOptions) -> Self {
        self.options = options;
        self
    }

    /// Verify every selected interaction. A failing interaction never stops
    /// the run; each gets its own result.
    pub async fn verify(&self, pact: &Pact) -> VerificationReport {
        info!(
            "Verifying {} interaction(s) between {} and {}",
            pact.interactions.len(),
            pact.consumer,
            pact.provider
        );
        let mut results = Vec::new();
        let mut skipped = Vec::new();
        for interaction in &pact.interactions {
            if !self.options.selects(interaction) {
                debug!("Skipping '{}'", interaction.description());
                skipped.push(interaction.description().to_string());
                continue;
            }
            results.push(self.verify_interaction(interaction).await);
        }

        let report = VerificationReport {
            consumer: pact.consumer.clone(),
            provider: pact.provider.clone(),
            results,
            skipped,
        };
        info!(
            "Verification finished: {} passed, {} failed",
            report.passed(),
            report.results.len() - report.passed()
        );
        report
    }

    pub async fn verify_interaction(&self, interaction: &Interaction) -> InteractionResult {
        let description = interaction.description();
        let states = interaction.provider_states();

        let mut provider_state = BTreeMap::new();
        for (index, state) in states.iter().enumerate() {
            match self.state_handler.set_up(state).await {
                Ok(values) => provider_state.extend(values),
                Err(e) => {
                    error!("Provider state setup for '{}' failed: {}", description, e);
                    self.tear_down(&states[..index]).await;
                    return InteractionResult::new(
                        description,
                        VerificationResult::error(FailureCause::StateChange(e.to_string())),
                    );
                }
            }
        }

        let mut result = match interaction {
            Interaction::Http(http) => self.verify_http(http, &provider_state).await,
            Interaction::Message(message) => self.verify_message(message, &provider_state).await,
        };

        if let Some(reason) = self.tear_down(states).await {
            if result.is_ok() {
                result = VerificationResult::error(FailureCause::StateChange(reason));
            }
        }

        match &result {
            VerificationResult::Ok => info!("'{}': OK", description),
            other => warn!("'{}': {}", description, other),
        }
        InteractionResult::new(description, result)
    }

    /// Tear states down in reverse order, returning the first failure.
    async fn tear_down(&self, states: &[ProviderState]) -> Option<String> {
        let mut failure = None;
        for state in states.iter().rev() {
            if let Err(e) = self.state_handler.tear_down(state).await {
                warn!("Provider state teardown failed: {}", e);
                failure.get_or_insert(e.to_string());
            }
        }
        failure
    }

    fn context(&self, provider_state: &BTreeMap<String, Value>) -> GeneratorContext {
        GeneratorContext::provider()
            .with_provider_state(provider_state.clone())
            .with_seed(self.options.seed)
    }

    async fn verify_http(
        &self,
        interaction: &HttpInteraction,
        provider_state: &BTreeMap<String, Value>,
    ) -> VerificationResult {
        let ctx = self.context(provider_state);
        let mut rng = ctx.rng();
        let generated = generate_request_with_rng(&interaction.request, &ctx, &mut rng).and_then(
            |request| {
                generate_response_with_rng(&interaction.response, &ctx, &mut rng)
                    .map(|response| (request, response))
            },
        );
        let (request, expected) = match generated {
            Ok(pair) => pair,
            Err(e) => return VerificationResult::error(FailureCause::Generator(e.to_string())),
        };

        let actual = match self.client.send(&request).await {
            Ok(response) => response,
            Err(e) => return VerificationResult::error(FailureCause::Transport(e.to_string())),
        };

        let mismatches = match_response_with_rules(
            &expected,
            &actual,
            &expected.matching_rules,
            self.options.match_options(),
        );
        if mismatches.is_empty() {
            VerificationResult::Ok
        } else {
            VerificationResult::PartialMismatch { mismatches }
        }
    }

    async fn verify_message(
        &self,
        interaction: &MessageInteraction,
        provider_state: &BTreeMap<String, Value>,
    ) -> VerificationResult {
        let Some(producer) = &self.message_producer else {
            return VerificationResult::error(FailureCause::Setup(format!(
                "no message producer configured for '{}'",
                interaction.description
            )));
        };

        let expected = match generate_message(&interaction.message, &self.context(provider_state)) {
            Ok(message) => message,
            Err(e) => return VerificationResult::error(FailureCause::Generator(e.to_string())),
        };
        let actual = match producer.produce(interaction, provider_state).await {
            Ok(message) => message,
            Err(e) => return VerificationResult::error(FailureCause::Transport(e.to_string())),
        };

        let mismatches = match_message_with_rules(
            &expected,
            &actual,
            &expected.matching_rules,
            self.options.match_options(),
        );
        if mismatches.is_empty() {
            VerificationResult::Ok
        } else {
            VerificationResult::PartialMismatch { mismatches }
        }
    }
}
