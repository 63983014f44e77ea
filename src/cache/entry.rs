//! Cache Entry Module
//!
//! Defines a cached origin response and its absolute expiration time.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A cached origin response keyed by request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Lookup key derived from request identity
    pub fingerprint: String,
    /// Reconstructed outbound URL, kept for diagnostics only
    pub target_url: String,
    /// Raw response payload
    pub body: Bytes,
    /// MIME type echoed back to the caller
    pub content_type: String,
    /// Entry is live while `now < expires_at`
    pub expires_at: DateTime<Utc>,
    /// Time of the last write
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written at `now` that stays live for `ttl`.
    pub fn new(
        fingerprint: impl Into<String>,
        target_url: impl Into<String>,
        body: Bytes,
        content_type: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            fingerprint: fingerprint.into(),
            target_url: target_url.into(),
            body,
            content_type: content_type.into(),
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: now,
        }
    }

    // == Is Live ==
    /// Returns true while the entry has not reached its expiration time.
    ///
    /// An entry whose `expires_at` equals `now` is already expired.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Remaining lifetime at `now`, zero once expired.
    pub fn ttl_remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
