//! Service middleware for request tracking and metrics.
//!
//! ## Log Targets
//!
//! - `mapkeeper::access` - one line per request with correlation id
//! - `mapkeeper::metrics` - request counts and latency by normalized path

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Header carrying the request correlation id, in and out.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request logging middleware that adds a correlation id and timing.
///
/// Reuses an incoming `x-request-id` or generates a UUID, runs the request
/// inside a span carrying it, and echoes it on the response.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "mapkeeper::access",
        request_id = %request_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing; aggregate from the log stream.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "mapkeeper::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces entity ids with a `:id` placeholder.
fn normalize_path(path: &str) -> String {
    static ID_PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    let pattern = ID_PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"\b(?:usr|dir|map|room)-[0-9a-f]+\b").expect("id pattern is valid")
    });
    pattern.replace_all(path, ":id").to_string()
}
