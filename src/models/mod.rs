//! Response models for the proxy's own endpoints
//!
//! This module defines the DTOs (Data Transfer Objects) serialized by the
//! health, stats and error responses. Proxied bodies are passed through as-is.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, HealthResponse, StatsResponse};
