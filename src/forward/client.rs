//! Outbound HTTP client
//!
//! [`HttpForwarder`] sends reconstructed requests to the origin through the
//! shared retry loop and circuit breaker.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use tracing::debug;

use super::breaker::{CircuitBreaker, CircuitState};
use super::retry::{with_retry, RetryConfig};
use super::{ForwardRequest, ForwardResponse, Forwarder};
use crate::error::ForwardError;

/// Content type reported when the origin does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Origin client shared by every request.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    retry: RetryConfig,
    breaker: Arc<CircuitBreaker>,
}

impl HttpForwarder {
    /// Builds a forwarder around a fresh connection pool.
    pub fn new(retry: RetryConfig, breaker: Arc<CircuitBreaker>) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ForwardError::Request(e.to_string()))?;
        Ok(Self::with_client(client, retry, breaker))
    }

    /// Builds a forwarder around an existing client.
    pub fn with_client(
        client: reqwest::Client,
        retry: RetryConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            client,
            retry,
            breaker,
        }
    }

    /// The breaker guarding this forwarder.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    async fn attempt(&self, request: &ForwardRequest) -> Result<ForwardResponse, ForwardError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ForwardError::Upstream {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = response.bytes().await?;

        debug!(
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            "origin responded"
        );

        Ok(ForwardResponse {
            status: status.as_u16(),
            body,
            content_type,
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: &ForwardRequest) -> Result<ForwardResponse, ForwardError> {
        with_retry(&self.retry, &self.breaker, &request.url, move || {
            self.attempt(request)
        })
        .await
    }

    fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}
