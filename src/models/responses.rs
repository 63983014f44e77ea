//! Response DTOs for the proxy API
//!
//! Defines the structure of outgoing JSON bodies.

use serde::Serialize;

use crate::cache::StatsSnapshot;
use crate::forward::CircuitState;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Requests answered from cache
    pub hits: u64,
    /// Requests that found no live entry
    pub misses: u64,
    /// Successful origin calls
    pub forwards: u64,
    /// Origin calls that failed after retries
    pub forward_failures: u64,
    /// Failures answered from a live entry
    pub stale_fallbacks: u64,
    /// Cache backend failures
    pub store_errors: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Outbound circuit breaker state
    pub circuit: CircuitState,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a counter snapshot
    pub fn new(snapshot: StatsSnapshot, circuit: CircuitState) -> Self {
        Self {
            hits: snapshot.hits,
            misses: snapshot.misses,
            forwards: snapshot.forwards,
            forward_failures: snapshot.forward_failures,
            stale_fallbacks: snapshot.stale_fallbacks,
            store_errors: snapshot.store_errors,
            hit_rate: snapshot.hit_rate(),
            circuit,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
