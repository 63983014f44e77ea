//! Cache Proxy - A caching reverse proxy
//!
//! Forwards GET/POST requests to the URL named in the `url` query parameter
//! and caches the answers by request fingerprint, with retries, a circuit
//! breaker and stale-tolerant fallback when the origin fails.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod forward;
pub mod models;
pub mod proxy;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_cleanup_task;
