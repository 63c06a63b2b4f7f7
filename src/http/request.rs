//! Request identification and path handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the caller sent none
//! - Build the per-request tracing span carrying that ID
//! - Split `/{service}/{rest}` into the path forwarded upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The forwarded path is cut from the raw URI so percent-encoding survives

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assigns `x-request-id: <uuid v4>` to requests that lack one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID header value, or `"unknown"`.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span wrapping one inbound request.
pub fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id(request),
    )
}

/// Path below the first segment: `/svc/a/b` → `/a/b`, `/svc` → `/`.
pub fn service_relative_path(raw: &str) -> String {
    let trimmed = raw.strip_prefix('/').unwrap_or(raw);
    match trimmed.find('/') {
        Some(index) => trimmed[index..].to_string(),
        None => "/".to_string(),
    }
}
