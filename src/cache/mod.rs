//! Cache Module
//!
//! Request fingerprinting and TTL-bounded response storage.

mod entry;
mod key;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use key::{
    has_payload_semantics, is_skipped_header, reconstruct_url, CacheKeyBuilder, SKIPPED_HEADERS,
};
pub use stats::{ProxyStats, StatsSnapshot};
pub use store::{CacheStore, MemoryCacheStore};
