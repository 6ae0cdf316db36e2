//! Sending concrete requests to the provider under test.

use crate::model::{HttpRequest, HttpResponse, MultiValueMap, OptionalBody};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid request {method} {url}: {reason}")]
    InvalidRequest {
        method: String,
        url: String,
        reason: String,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Failed to read response from {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("Message producer failed: {0}")]
    Producer(String),
}

/// Anything that can turn a request into the provider's response: a real
/// network call or an in-process dispatcher.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Sends requests to a provider over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, request: &HttpRequest) -> String {
        let mut url = format!("{}{}", self.base_url, request.path);
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&request.query.to_query_string());
        }
        url
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(request);
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            TransportError::InvalidRequest {
                method: request.method.clone(),
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut builder = self.client.request(method, &url);
        for (name, values) in request.headers.iter() {
            for value in values {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_missing() {
            builder = builder.body(request.body.bytes().to_vec());
        }

        debug!("Sending {} to provider", request.summary());
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { url: url.clone() }
            } else if e.is_builder() {
                TransportError::InvalidRequest {
                    method: request.method.clone(),
                    url: url.clone(),
                    reason: e.to_string(),
                }
            } else {
                TransportError::Request {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let mut headers = MultiValueMap::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        let bytes = response.bytes().await.map_err(|e| TransportError::Body {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let body = if bytes.is_empty() {
            OptionalBody::Missing
        } else {
            let content_type = headers.first_ignore_case("content-type").map(str::to_string);
            OptionalBody::present(bytes, content_type)
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
            ..Default::default()
        })
    }
}
