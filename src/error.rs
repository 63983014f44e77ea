//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Message returned to callers when the origin cannot be reached and nothing is cached.
pub const GATEWAY_TIMEOUT_MESSAGE: &str =
    "The upstream server did not respond in time and no cached response is available";

// == Proxy Error Enum ==
/// Errors surfaced to the inbound caller.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Missing, unparsable or non-http(s) target URL
    #[error("Invalid target url: {0}")]
    InvalidTarget(String),

    /// Forwarding failed and no live cache entry could stand in
    #[error("{}", GATEWAY_TIMEOUT_MESSAGE)]
    GatewayTimeout,

    /// Client exceeded its admission budget
    #[error("Too many requests, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        let mut response = (status, body).into_response();
        if let ProxyError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

// == Forward Error Enum ==
/// Failures of a single outbound call or of the whole forwarding budget.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// Attempt exceeded its timeout
    #[error("Upstream timed out")]
    Timeout,

    /// Could not establish or keep a connection
    #[error("Upstream connection failed: {0}")]
    Connect(String),

    /// Origin answered with a server error
    #[error("Upstream returned status {status}")]
    Upstream { status: u16 },

    /// Request could not be built or sent
    #[error("Upstream request failed: {0}")]
    Request(String),

    /// Breaker is open, no network attempt was made
    #[error("Circuit open for upstream")]
    CircuitOpen,

    /// Every attempt failed with a transient error
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ForwardError>,
    },
}

impl ForwardError {
    /// Whether another attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForwardError::Timeout | ForwardError::Connect(_) | ForwardError::Upstream { .. }
        )
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout
        } else if err.is_builder() {
            ForwardError::Request(err.to_string())
        } else {
            // reqwest reports resets and mid-body I/O failures as request/body errors
            ForwardError::Connect(err.to_string())
        }
    }
}

// == Store Error Enum ==
/// Failures of the cache backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend could not be reached or rejected the operation
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}

// == Result Type Alias ==
/// Convenience Result type for inbound request handling.
pub type Result<T> = std::result::Result<T, ProxyError>;
