//! Inbound request parsing
//!
//! Turns the raw pieces of an inbound `/api/proxy` call into a validated
//! [`ProxyRequest`]: target URL checked, pass-through parameters appended,
//! skip-set headers removed and the payload captured as received.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use url::Url;

use crate::cache::{has_payload_semantics, is_skipped_header, reconstruct_url};
use crate::error::ProxyError;
use crate::forward::ForwardRequest;

/// Name of the query parameter carrying the target URL.
pub const TARGET_PARAM: &str = "url";

/// A validated proxy request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Target URL with pass-through query parameters appended
    pub full_url: String,
    /// Inbound headers minus the skip set, in inbound order
    pub headers: HeaderMap,
    /// Inbound payload bytes, only for body-bearing methods
    pub payload: Option<Bytes>,
    /// Payload as it enters the fingerprint; JSON has insignificant
    /// whitespace removed, anything else equals `payload`
    pub key_payload: Option<Bytes>,
}

impl ProxyRequest {
    /// Validates and assembles a proxy request.
    ///
    /// Fails with [`ProxyError::InvalidTarget`] when the `url` parameter is
    /// missing, unparsable, not absolute or not http(s).
    pub fn from_parts(
        method: Method,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Self, ProxyError> {
        let (target, params) = split_query(query.unwrap_or_default());
        let target = target
            .ok_or_else(|| ProxyError::InvalidTarget("the 'url' query parameter is required".into()))?;
        validate_target(&target)?;

        let payload = has_payload_semantics(&method).then_some(body);
        let key_payload = payload.as_ref().map(fingerprint_payload);

        Ok(Self {
            method,
            full_url: reconstruct_url(&target, &params),
            headers: forwardable_headers(headers),
            payload,
            key_payload,
        })
    }

    /// The outbound request for this proxy request.
    pub fn to_forward_request(&self) -> ForwardRequest {
        ForwardRequest {
            method: self.method.clone(),
            url: self.full_url.clone(),
            headers: self.headers.clone(),
            body: self.payload.clone(),
        }
    }
}

/// Splits the inbound query into the target URL and the pass-through pairs.
///
/// The first `url` parameter is the target; every `url` parameter is dropped
/// from the pass-through list. Order of the remaining pairs is preserved.
fn split_query(query: &str) -> (Option<String>, Vec<(String, String)>) {
    let mut target = None;
    let mut params = Vec::new();

    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if name == TARGET_PARAM {
            if target.is_none() {
                target = Some(value.into_owned());
            }
        } else {
            params.push((name.into_owned(), value.into_owned()));
        }
    }

    (target, params)
}

fn validate_target(target: &str) -> Result<(), ProxyError> {
    let parsed = Url::parse(target)
        .map_err(|e| ProxyError::InvalidTarget(format!("'{target}' is not an absolute url: {e}")))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        "http" | "https" => Err(ProxyError::InvalidTarget(format!(
            "'{target}' has no host"
        ))),
        scheme => Err(ProxyError::InvalidTarget(format!(
            "scheme '{scheme}' is not supported, use http or https"
        ))),
    }
}

/// Copies every header outside the skip set, keeping inbound order.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_skipped_header(name.as_str()) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

/// Fingerprint form of a payload.
///
/// Valid JSON loses the whitespace between tokens and nothing else, so keys
/// keep their order and numbers keep their digits. Other payloads are used
/// unchanged.
fn fingerprint_payload(body: &Bytes) -> Bytes {
    if serde_json::from_slice::<serde::de::IgnoredAny>(body).is_err() {
        return body.clone();
    }

    let mut compact = Vec::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    for &byte in body.iter() {
        if in_string {
            compact.push(byte);
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' => {}
            b'"' => {
                in_string = true;
                compact.push(byte);
            }
            _ => compact.push(byte),
        }
    }
    Bytes::from(compact)
}
