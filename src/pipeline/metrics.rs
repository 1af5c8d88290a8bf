//! Request metrics stage.
//!
//! Emits through the `metrics` facade. Without an installed recorder every
//! call is a no-op.

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

/// Counter of finished requests, labelled by method, route and status.
pub const REQUESTS_TOTAL: &str = "http_requests_total";
/// Histogram of request latency in seconds, same labels.
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Route label for requests no route matched.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Counts the request and records its latency once the response is ready.
///
/// The route label is the matched route template (`/api/v1/todos/:id`), not
/// the raw path, so label cardinality stays bounded.
pub async fn metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let response = next.run(req).await;
    record_request(&method, &route, response.status().as_u16(), started.elapsed());
    response
}

/// Records one finished request.
pub fn record_request(method: &str, route: &str, status: u16, latency: Duration) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .record(latency.as_secs_f64());
}
