//! Header handling between client and upstream.
//!
//! # Responsibilities
//! - Drop the inbound Host header (the upstream sees its own authority)
//! - Drop body framing headers when no body is forwarded
//! - Strip hop-by-hop headers from upstream responses

use axum::http::header::{self, HeaderMap, HeaderName};

/// Headers that only describe a single connection and must not be relayed.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Headers sent upstream: everything inbound except `Host`, and without
/// framing headers when the body is not forwarded.
pub fn upstream_request_headers(inbound: &HeaderMap, forwards_body: bool) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    if !forwards_body {
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
    }
    headers
}

/// Remove connection-scoped headers from an upstream response in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn host_is_removed_everything_else_kept() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert("x-custom", HeaderValue::from_static("1"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("4"));

        let out = upstream_request_headers(&inbound, true);
        assert!(out.get(header::HOST).is_none());
        assert_eq!(out["x-custom"], "1");
        assert_eq!(out[header::CONTENT_LENGTH], "4");

        let bodiless = upstream_request_headers(&inbound, false);
        assert!(bodiless.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(bodiless["x-custom"], "1");
    }

    #[test]
    fn hop_by_hop_stripped_from_response() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }
}
