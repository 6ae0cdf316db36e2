//! Mock server configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 binds an ephemeral port.
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// How long open connections get to finish after `stop` before they are aborted.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default)]
    pub session_timeout_ms: Option<u64>,
    /// Seed for random generators, for reproducible fixtures.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_grace_period_ms() -> u64 {
    2000
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            tls: None,
            grace_period_ms: default_grace_period_ms(),
            session_timeout_ms: None,
            seed: None,
        }
    }
}

impl MockServerConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

/// PEM certificate chain and private key served by an https mock server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: MockServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.grace_period(), Duration::from_secs(2));
        assert!(config.session_timeout().is_none());
        assert_eq!(config.scheme(), "http");
    }

    #[test]
    fn test_tls_switches_scheme() {
        let config = MockServerConfig::default().with_tls("cert.pem", "key.pem");
        assert_eq!(config.scheme(), "https");
    }
}
