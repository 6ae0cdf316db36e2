//! Values a generator may draw on when it runs.

use chrono::{DateTime, FixedOffset, Local};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which side of the contract is generating values.
///
/// Provider state values only exist during provider verification, and the mock
/// server URL only exists on the consumer side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    #[default]
    Consumer,
    Provider,
}

/// Typed context handed to every generator invocation.
#[derive(Debug, Clone, Default)]
pub struct GeneratorContext {
    pub mode: GeneratorMode,
    /// Parameters bound by provider state setup.
    pub provider_state: BTreeMap<String, Value>,
    /// Base URL of the running mock server.
    pub mock_server_url: Option<String>,
    /// Seed for reproducible random values.
    pub seed: Option<u64>,
    /// Reference time for date and time generators; defaults to now.
    pub base_time: Option<DateTime<FixedOffset>>,
}

impl GeneratorContext {
    pub fn consumer() -> Self {
        Self::default()
    }

    pub fn provider() -> Self {
        Self {
            mode: GeneratorMode::Provider,
            ..Default::default()
        }
    }

    pub fn with_provider_state(mut self, values: BTreeMap<String, Value>) -> Self {
        self.provider_state.extend(values);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.provider_state.insert(key.into(), value);
        self
    }

    pub fn with_mock_server_url(mut self, url: impl Into<String>) -> Self {
        self.mock_server_url = Some(url.into());
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_base_time(mut self, at: DateTime<FixedOffset>) -> Self {
        self.base_time = Some(at);
        self
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.base_time.unwrap_or_else(|| Local::now().fixed_offset())
    }

    /// Fresh generator RNG: seeded when a seed is configured, from entropy otherwise.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
