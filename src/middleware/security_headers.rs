//! Response hardening for a JSON-only API
//!
//! Nothing this server returns is meant to be framed, sniffed, or cached by
//! intermediaries: responses can carry zone data and account metadata.

use axum::{extract::Request, middleware::Next, response::Response};
use http::{header, HeaderName, HeaderValue};

const HEADERS: &[(HeaderName, &str)] = &[
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
];

/// Middleware that adds the hardening headers to every response.
///
/// `Cache-Control: no-store` is only set when the handler did not choose its
/// own caching policy.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in HEADERS {
        headers.insert(name.clone(), HeaderValue::from_static(value));
    }
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));

    response
}
