//! API Module
//!
//! HTTP handlers, routing and admission control for the proxy.
//!
//! # Endpoints
//! - `GET /api/proxy?url=...` - Proxy a GET request
//! - `POST /api/proxy?url=...` - Proxy a POST request
//! - `GET /stats` - Cache and forwarding statistics
//! - `GET /health` - Health check endpoint

pub mod admission;
pub mod handlers;
pub mod routes;

pub use admission::{RateLimitConfig, RateLimiter};
pub use handlers::*;
pub use routes::create_router;
