//! Admission Control
//!
//! Per-client fixed-window rate limiting in front of the proxy routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ProxyError;

/// Header consulted first when identifying a client.
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate limit policy. `permits == 0` disables limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window
    pub permits: u32,
    /// Window length
    pub window: Duration,
    /// Key clients on the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            permits: 100,
            window: Duration::from_secs(60),
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    used: u32,
}

// == Rate Limiter ==
/// Fixed-window counters keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Takes one permit for `client`.
    pub fn check(&self, client: &str) -> Result<(), ProxyError> {
        if self.config.permits == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut window = self
            .windows
            .entry(client.to_string())
            .or_insert(Window {
                started: now,
                used: 0,
            });

        let elapsed = now.duration_since(window.started);
        if elapsed >= self.config.window {
            *window = Window {
                started: now,
                used: 0,
            };
        }

        if window.used >= self.config.permits {
            let remaining = self.config.window.saturating_sub(elapsed);
            // round up so callers never retry before the window resets
            let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(ProxyError::RateLimited { retry_after_secs });
        }

        window.used += 1;
        Ok(())
    }

    /// Forgets clients whose window has ended, returning how many.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.config.window);
        before - self.windows.len()
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Identity `request` is counted under.
    pub fn client_of(&self, request: &Request) -> String {
        client_id(request, self.config.trust_forwarded_for)
    }
}

/// Identifies the caller by peer address, or by the first `X-Forwarded-For`
/// hop when `trust_forwarded_for` is set.
pub fn client_id(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Middleware rejecting clients that exhausted their window with `429`.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = limiter.client_of(&request);
    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            debug!(%client, "rate limit exceeded");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn limiter(permits: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            permits,
            window: Duration::from_secs(10),
            ..RateLimitConfig::default()
        })
    }

    fn from_peer(forwarded_for: &str) -> Request {
        let mut request = Request::builder()
            .header(FORWARDED_FOR, forwarded_for)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 9], 5000))));
        request
    }

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_permits_per_window() {
        let limiter = limiter(2);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        match limiter.check("a") {
            Err(ProxyError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 10),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets() {
        let limiter = limiter(1);
        assert!(limiter.check("a").is_ok());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.check("a").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_permits_disables_limiting() {
        let limiter = limiter(0);
        for _ in 0..1000 {
            assert!(limiter.check("a").is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_finished_windows() {
        let limiter = limiter(5);
        limiter.check("a").unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.check("b").unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(limiter.prune(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn client_id_ignores_forwarded_for_by_default() {
        let request = from_peer("203.0.113.7, 10.0.0.1");
        assert_eq!(client_id(&request, false), "198.51.100.9");
    }

    #[test]
    fn client_id_uses_forwarded_for_when_trusted() {
        let request = from_peer("203.0.113.7, 10.0.0.1");
        assert_eq!(client_id(&request, true), "203.0.113.7");
    }

    #[test]
    fn client_id_falls_back_to_peer_then_anonymous() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_id(&request, true), "anonymous");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_id(&request, true), "192.0.2.1");
    }

    #[tokio::test(start_paused = true)]
    async fn rotating_forwarded_for_does_not_reset_window() {
        let limiter = limiter(2);
        for hop in ["203.0.113.1", "203.0.113.2"] {
            let client = limiter.client_of(&from_peer(hop));
            assert!(limiter.check(&client).is_ok());
        }

        let client = limiter.client_of(&from_peer("203.0.113.3"));
        assert!(matches!(
            limiter.check(&client),
            Err(ProxyError::RateLimited { .. })
        ));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
