//! Request logging stage.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::info;

use super::trace::TraceContext;

/// Emits one event when a request starts and one when it finishes.
pub async fn logging(req: Request, next: Next) -> Response {
    let ctx = TraceContext::of(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!(
        trace_id = %ctx.trace_id,
        request_id = %ctx.request_id,
        %method,
        %path,
        "request started"
    );

    let response = next.run(req).await;

    info!(
        trace_id = %ctx.trace_id,
        request_id = %ctx.request_id,
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = ctx.elapsed().as_millis() as u64,
        subject = ctx.subject().unwrap_or("-"),
        "request finished"
    );
    response
}
