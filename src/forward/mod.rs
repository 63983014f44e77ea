//! Forwarding Module
//!
//! Resilient outbound calls to the origin: per-attempt timeout, retries with
//! exponential backoff, and a shared circuit breaker.

mod breaker;
mod client;
mod retry;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use crate::error::ForwardError;

pub use breaker::{BreakerConfig, CallPermit, CircuitBreaker, CircuitState};
pub use client::{HttpForwarder, DEFAULT_CONTENT_TYPE};
pub use retry::RetryConfig;

/// An outbound request as reconstructed from the inbound one.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Target URL with pass-through query parameters appended
    pub url: String,
    /// Inbound headers minus the skip set
    pub headers: HeaderMap,
    /// Serialized payload for body-bearing methods
    pub body: Option<Bytes>,
}

/// What the origin answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardResponse {
    pub status: u16,
    pub body: Bytes,
    pub content_type: String,
}

/// Sends requests to the origin.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forwards `request`, retrying transient failures internally.
    async fn forward(&self, request: &ForwardRequest) -> Result<ForwardResponse, ForwardError>;

    /// State of the breaker guarding this forwarder.
    fn circuit_state(&self) -> CircuitState {
        CircuitState::Closed
    }
}
