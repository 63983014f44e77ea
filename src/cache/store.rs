//! Cache Store Module
//!
//! Get-if-unexpired / upsert-by-fingerprint storage for cached responses.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::cache::CacheEntry;
use crate::error::StoreError;

// == Cache Store Trait ==
/// Key-value backend holding at most one entry per fingerprint.
///
/// Expiration is a read-time predicate: a stored entry whose `expires_at` is
/// not after `now` is never returned, whether or not it still exists.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry for `fingerprint` if it is live at `now`.
    async fn get(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, StoreError>;

    /// Inserts or replaces the entry with the same fingerprint.
    async fn set(&self, entry: CacheEntry) -> Result<(), StoreError>;

    /// Physically removes entries expired at `now`, returning how many.
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(0)
    }
}

// == Memory Cache Store ==
/// In-process backend, one map shared by every request.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Number of physically stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(fingerprint)
            .filter(|entry| entry.is_live_at(now))
            .cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.fingerprint.clone(), entry);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live_at(now));
        Ok(before - entries.len())
    }
}
