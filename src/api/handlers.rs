//! API Handlers
//!
//! HTTP request handlers for the proxy endpoint and the service endpoints.

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, Method},
    Json,
};
use bytes::Bytes;

use super::admission::RateLimiter;
use crate::cache::{CacheStore, MemoryCacheStore, ProxyStats};
use crate::config::Config;
use crate::error::{ForwardError, Result};
use crate::forward::{CircuitBreaker, Forwarder, HttpForwarder};
use crate::models::{HealthResponse, StatsResponse};
use crate::proxy::{ProxyOrchestrator, ProxyRequest, ProxyResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside pipeline
    pub proxy: Arc<ProxyOrchestrator>,
    /// Admission control for the proxy routes
    pub limiter: Arc<RateLimiter>,
    /// Backing store, shared with the sweeper
    pub store: Arc<dyn CacheStore>,
}

impl AppState {
    /// Creates a new AppState from its collaborators.
    pub fn new(
        store: Arc<dyn CacheStore>,
        forwarder: Arc<dyn Forwarder>,
        config: &Config,
    ) -> Self {
        let proxy = ProxyOrchestrator::new(
            store.clone(),
            forwarder,
            config.cache_ttl(),
            Arc::new(ProxyStats::new()),
        );
        Self {
            proxy: Arc::new(proxy),
            limiter: Arc::new(RateLimiter::new(config.rate_limit())),
            store,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Uses the in-memory store and an HTTP forwarder with its own breaker.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ForwardError> {
        let breaker = Arc::new(CircuitBreaker::new(config.breaker()));
        let forwarder = HttpForwarder::new(config.retry(), breaker)?;
        Ok(Self::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(forwarder),
            config,
        ))
    }
}

/// Handler for GET and POST /api/proxy
///
/// Forwards the request to the `url` query parameter, answering from cache
/// when possible.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ProxyResponse> {
    let request = ProxyRequest::from_parts(method, query.as_deref(), &headers, body)?;
    state.proxy.handle(request).await
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.proxy.stats().snapshot(),
        state.proxy.circuit_state(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
