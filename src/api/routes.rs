//! API Routes
//!
//! Configures the Axum router with the proxy and service endpoints.

use axum::{middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::admission::enforce_rate_limit;
use super::handlers::{health_handler, proxy_handler, stats_handler, AppState};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/proxy?url=...` - Proxy a GET request
/// - `POST /api/proxy?url=...` - Proxy a POST request with its JSON body
/// - `GET /stats` - Cache and forwarding statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Rate limiting: per-client, proxy routes only
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/proxy", get(proxy_handler).post(proxy_handler))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            enforce_rate_limit,
        ))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::config::Config;
    use crate::error::ForwardError;
    use crate::forward::{ForwardRequest, ForwardResponse, Forwarder};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use bytes::Bytes;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct DownForwarder;

    #[async_trait]
    impl Forwarder for DownForwarder {
        async fn forward(&self, _: &ForwardRequest) -> Result<ForwardResponse, ForwardError> {
            Err(ForwardError::CircuitOpen)
        }
    }

    fn create_test_app(config: Config) -> Router {
        let state = AppState::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(DownForwarder),
            &config,
        );
        create_router(state)
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let status = get_status(create_test_app(Config::default()), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let status = get_status(create_test_app(Config::default()), "/stats").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_without_url() {
        let status = get_status(create_test_app(Config::default()), "/api/proxy").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_proxy_with_ftp_url() {
        let status = get_status(create_test_app(Config::default()), "/api/proxy?url=ftp://x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_proxy_origin_down_is_gateway_timeout() {
        let app = create_test_app(Config::default());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/proxy?url=http://example.com/api")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"q":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            body,
            Bytes::from(format!(
                r#"{{"error":"{}"}}"#,
                crate::error::GATEWAY_TIMEOUT_MESSAGE
            ))
        );
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_proxy_only() {
        let config = Config {
            rate_limit_permits: 1,
            ..Config::default()
        };
        let app = create_test_app(config);

        assert_eq!(get_status(app.clone(), "/api/proxy").await, StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(app.clone(), "/api/proxy").await,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(get_status(app, "/health").await, StatusCode::OK);
    }
}
