//! Proxy orchestration
//!
//! Per-request cache-aside flow: fingerprint the request, answer from the
//! store when a live entry exists, otherwise forward to the origin and write
//! the answer back. When forwarding fails the store is consulted once more
//! and a still-live entry is served instead of an error.
//!
//! Store failures are logged and treated as misses; a failed write never
//! affects the response.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::request::ProxyRequest;
use crate::cache::{CacheEntry, CacheKeyBuilder, CacheStore, ProxyStats};
use crate::error::ProxyError;
use crate::forward::{CircuitState, Forwarder};

/// Diagnostic header telling the caller where the body came from.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Live entry found before forwarding
    Hit,
    /// Fetched from the origin
    Miss,
    /// Forwarding failed, live entry served instead
    Fallback,
}

impl ResponseSource {
    fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Hit => "HIT",
            ResponseSource::Miss => "MISS",
            ResponseSource::Fallback => "STALE",
        }
    }
}

/// Body echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub body: Bytes,
    pub content_type: String,
    pub source: ResponseSource,
}

impl ProxyResponse {
    fn from_entry(entry: CacheEntry, source: ResponseSource) -> Self {
        Self {
            body: entry.body,
            content_type: entry.content_type,
            source,
        }
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (X_CACHE, HeaderValue::from_static(self.source.as_str())),
            ],
            self.body,
        )
            .into_response()
    }
}

// == Proxy Orchestrator ==
/// Ties fingerprinting, the cache store and the forwarder together.
pub struct ProxyOrchestrator {
    keys: CacheKeyBuilder,
    store: Arc<dyn CacheStore>,
    forwarder: Arc<dyn Forwarder>,
    ttl: Duration,
    stats: Arc<ProxyStats>,
}

impl ProxyOrchestrator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        forwarder: Arc<dyn Forwarder>,
        ttl: Duration,
        stats: Arc<ProxyStats>,
    ) -> Self {
        Self {
            keys: CacheKeyBuilder::new(),
            store,
            forwarder,
            ttl,
            stats,
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> &Arc<ProxyStats> {
        &self.stats
    }

    /// State of the forwarder's circuit breaker.
    pub fn circuit_state(&self) -> CircuitState {
        self.forwarder.circuit_state()
    }

    /// Fingerprint of a validated request.
    pub fn fingerprint(&self, request: &ProxyRequest) -> String {
        self.keys.fingerprint(
            &request.method,
            &request.full_url,
            &request.headers,
            request.key_payload.as_deref(),
        )
    }

    /// Handles one proxied request.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let fingerprint = self.fingerprint(&request);
        debug!(%fingerprint, url = %request.full_url, "fingerprint computed");

        if let Some(entry) = self.lookup(&fingerprint).await {
            self.stats.record_hit();
            debug!(%fingerprint, "cache hit");
            return Ok(ProxyResponse::from_entry(entry, ResponseSource::Hit));
        }
        self.stats.record_miss();
        debug!(%fingerprint, "cache miss, forwarding");

        match self.forwarder.forward(&request.to_forward_request()).await {
            Ok(response) => {
                self.stats.record_forward();
                let entry = CacheEntry::new(
                    fingerprint,
                    request.full_url,
                    response.body,
                    response.content_type,
                    Utc::now(),
                    self.ttl,
                );
                self.store_entry(entry.clone()).await;
                Ok(ProxyResponse::from_entry(entry, ResponseSource::Miss))
            }
            Err(err) => {
                self.stats.record_forward_failure();
                warn!(%fingerprint, url = %request.full_url, error = %err, "forwarding failed");

                match self.lookup(&fingerprint).await {
                    Some(entry) => {
                        self.stats.record_stale_fallback();
                        info!(%fingerprint, "serving cached response after forwarding failure");
                        Ok(ProxyResponse::from_entry(entry, ResponseSource::Fallback))
                    }
                    None => Err(ProxyError::GatewayTimeout),
                }
            }
        }
    }

    async fn lookup(&self, fingerprint: &str) -> Option<CacheEntry> {
        match self.store.get(fingerprint, Utc::now()).await {
            Ok(entry) => entry,
            Err(err) => {
                self.stats.record_store_error();
                warn!(%fingerprint, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store_entry(&self, entry: CacheEntry) {
        let fingerprint = entry.fingerprint.clone();
        if let Err(err) = self.store.set(entry).await {
            self.stats.record_store_error();
            warn!(%fingerprint, error = %err, "cache write failed");
        }
    }
}
