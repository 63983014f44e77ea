//! Proxy Module
//!
//! Inbound request validation and the cache-aside orchestration around the
//! forwarder.

mod orchestrator;
mod request;

pub use orchestrator::{ProxyOrchestrator, ProxyResponse, ResponseSource, X_CACHE};
pub use request::{forwardable_headers, ProxyRequest, TARGET_PARAM};
