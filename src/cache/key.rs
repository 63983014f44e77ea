//! Cache Key Module
//!
//! Derives request fingerprints from the reconstructed target URL, the
//! significant inbound headers and, for body-bearing methods, the payload.

use axum::http::{HeaderMap, Method};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Headers never forwarded to the origin and never part of a fingerprint.
pub const SKIPPED_HEADERS: [&str; 5] = [
    "host",
    "connection",
    "content-length",
    "origin",
    "accept-encoding",
];

/// Separator between the URL digest and the payload digest.
const DIGEST_SEPARATOR: char = ':';

/// Returns true if the header is excluded from forwarding and fingerprinting.
pub fn is_skipped_header(name: &str) -> bool {
    SKIPPED_HEADERS
        .iter()
        .any(|skipped| skipped.eq_ignore_ascii_case(name))
}

/// Returns true for methods whose payload is part of request identity.
pub fn has_payload_semantics(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Appends pass-through query parameters to the target URL.
///
/// Parameters keep their inbound order; names and values are percent-encoded. The
/// separator is `?` unless the target already carries a query string.
pub fn reconstruct_url(target: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return target.to_string();
    }

    let query = params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    let separator = if target.contains('?') { '&' } else { '?' };

    format!("{target}{separator}{query}")
}

// == Cache Key Builder ==
/// Computes fingerprints for proxied requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint of a request to `full_url`.
    ///
    /// `payload` is only consulted for body-bearing methods; a missing payload
    /// hashes like an empty one.
    pub fn fingerprint(
        &self,
        method: &Method,
        full_url: &str,
        headers: &HeaderMap,
        payload: Option<&[u8]>,
    ) -> String {
        let mut canonical = if has_payload_semantics(method) {
            let url_digest = digest(full_url.as_bytes());
            let payload_digest = digest(payload.unwrap_or_default());
            format!("{url_digest}{DIGEST_SEPARATOR}{payload_digest}")
        } else {
            full_url.to_string()
        };

        for (name, value) in headers {
            if is_skipped_header(name.as_str()) {
                continue;
            }
            canonical.push('|');
            canonical.push_str(name.as_str());
            canonical.push(':');
            canonical.push_str(&String::from_utf8_lossy(value.as_bytes()));
        }

        digest(canonical.as_bytes())
    }
}

/// SHA-256 of `bytes`, base64 encoded.
fn digest(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}
