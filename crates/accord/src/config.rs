//! Configuration file shared by the `accord` and `accord-verify` binaries.
//!
//! YAML or JSON, chosen by file extension. Every section is optional; command
//! line flags override what the file sets.

use crate::mock_server::MockServerConfig;
use crate::verifier::VerifierOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccordConfig {
    #[serde(default)]
    pub mock_server: MockServerConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifierConfig {
    /// Base URL of the provider under test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Endpoint that receives provider state change calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_change_url: Option<String>,
    #[serde(default)]
    pub state_change_teardown: bool,
    #[serde(flatten)]
    pub options: VerifierOptions,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            state_change_url: None,
            state_change_teardown: false,
            options: VerifierOptions::default(),
        }
    }
}

impl AccordConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {e}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: AccordConfig = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let server = &self.mock_server;
        if server.host.trim().is_empty() {
            anyhow::bail!("mock_server.host must not be empty");
        }
        if server.session_timeout_ms == Some(0) {
            anyhow::bail!("mock_server.session_timeout_ms must be greater than zero");
        }
        if let Some(tls) = &server.tls {
            if tls.cert_path.is_empty() || tls.key_path.is_empty() {
                anyhow::bail!(
                    "TLS configuration requires both 'mock_server.tls.cert_path' and \
                     'mock_server.tls.key_path'"
                );
            }
        }

        let verifier = &self.verifier;
        for (name, url) in [
            ("provider_url", &verifier.provider_url),
            ("state_change_url", &verifier.state_change_url),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    anyhow::bail!("verifier.{name} must be an http(s) URL, got '{url}'");
                }
            }
        }
        if verifier.request_timeout_ms == 0 {
            anyhow::bail!("verifier.request_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "mock_server:\n  port: 9090\n  seed: 7\nverifier:\n  provider_url: http://localhost:8080\n  allow_unexpected_keys: true"
        )
        .unwrap();

        let config = AccordConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mock_server.port, 9090);
        assert_eq!(config.mock_server.seed, Some(7));
        assert_eq!(config.mock_server.grace_period_ms, 2000);
        assert!(config.verifier.options.allow_unexpected_keys);
        assert_eq!(config.verifier.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"verifier": {{"state_change_url": "http://localhost:8080/_state", "seed": 3}}}}"#
        )
        .unwrap();

        let config = AccordConfig::from_file(file.path()).unwrap();
        assert_eq!(config.verifier.options.seed, Some(3));
        assert_eq!(config.mock_server.host, "127.0.0.1");
    }

    #[test]
    fn test_validation_rejects_bad_urls() {
        let mut config = AccordConfig::default();
        config.verifier.provider_url = Some("localhost:8080".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider_url"));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = AccordConfig::default();
        config.mock_server.session_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = AccordConfig::from_file("/nonexistent/accord.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
