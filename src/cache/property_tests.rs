//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check fingerprint determinism and sensitivity.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use proptest::prelude::*;

use crate::cache::{reconstruct_url, CacheKeyBuilder};

// == Strategies ==
fn path_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9/]{0,32}".prop_map(|p| format!("http://example.com/{p}"))
}

fn params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z]{1,8}", "[ -~]{0,16}"), 0..5)
}

fn headers_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("x-[a-z]{1,10}", "[a-zA-Z0-9 ,;=/]{0,24}"), 0..5)
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..128)
}

fn header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
        map.append(name, HeaderValue::from_str(value).unwrap());
    }
    map
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Same url, params, headers and body always yield the same fingerprint.
    #[test]
    fn prop_fingerprint_deterministic(
        target in path_strategy(),
        params in params_strategy(),
        headers in headers_strategy(),
        payload in payload_strategy(),
        post in any::<bool>(),
    ) {
        let method = if post { Method::POST } else { Method::GET };
        let headers = header_map(&headers);
        let builder = CacheKeyBuilder::new();

        let first = builder.fingerprint(
            &method,
            &reconstruct_url(&target, &params),
            &headers,
            Some(payload.as_slice()),
        );
        let second = builder.fingerprint(
            &method,
            &reconstruct_url(&target, &params),
            &headers,
            Some(payload.as_slice()),
        );
        prop_assert_eq!(first, second);
    }

    // Changing a significant header value changes the fingerprint.
    #[test]
    fn prop_fingerprint_sensitive_to_header_value(
        target in path_strategy(),
        value_a in "[a-z]{1,12}",
        value_b in "[a-z]{1,12}",
    ) {
        prop_assume!(value_a != value_b);
        let builder = CacheKeyBuilder::new();
        let a = header_map(&[("x-variant".to_string(), value_a)]);
        let b = header_map(&[("x-variant".to_string(), value_b)]);

        prop_assert_ne!(
            builder.fingerprint(&Method::GET, &target, &a, None),
            builder.fingerprint(&Method::GET, &target, &b, None)
        );
    }

    // Changing the POST body changes the fingerprint.
    #[test]
    fn prop_fingerprint_sensitive_to_payload(
        target in path_strategy(),
        payload_a in payload_strategy(),
        payload_b in payload_strategy(),
    ) {
        prop_assume!(payload_a != payload_b);
        let builder = CacheKeyBuilder::new();
        let headers = HeaderMap::new();

        prop_assert_ne!(
            builder.fingerprint(&Method::POST, &target, &headers, Some(payload_a.as_slice())),
            builder.fingerprint(&Method::POST, &target, &headers, Some(payload_b.as_slice()))
        );
    }

    // Changing the target URL changes the fingerprint.
    #[test]
    fn prop_fingerprint_sensitive_to_url(
        target_a in path_strategy(),
        target_b in path_strategy(),
        post in any::<bool>(),
    ) {
        prop_assume!(target_a != target_b);
        let method = if post { Method::POST } else { Method::GET };
        let builder = CacheKeyBuilder::new();
        let headers = HeaderMap::new();

        prop_assert_ne!(
            builder.fingerprint(&method, &target_a, &headers, None),
            builder.fingerprint(&method, &target_b, &headers, None)
        );
    }
}
