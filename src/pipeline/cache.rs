//! Response cache stage.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::trace::TraceContext;
use crate::api::AppState;
use crate::cache::{cache_key, BufferedResponse};
use crate::error::AppError;

pub const CACHE_HEADER: &str = "x-cache";

/// Serves GET requests from the response cache, filling it on a 2xx miss.
///
/// Runs after authentication so the key can include the subject; two users
/// never share an entry.
pub async fn cache(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let ctx = TraceContext::of(&req);
    let key = cache_key(
        req.method().as_str(),
        req.uri().path(),
        req.uri().query(),
        ctx.subject(),
    );

    if let Some(bytes) = state.response_cache.lookup(&key).await {
        match BufferedResponse::from_cache_bytes(bytes) {
            Some(cached) => return cached.with_header(CACHE_HEADER, "HIT").into_response(),
            None => warn!(
                trace_id = %ctx.trace_id,
                key = %key,
                "unreadable cache entry, treating as miss"
            ),
        }
    }

    let buffered = match BufferedResponse::capture(next.run(req).await).await {
        Ok(buffered) => buffered,
        Err(err) => {
            warn!(trace_id = %ctx.trace_id, error = %err, "failed to buffer response");
            return AppError::Internal(err.to_string()).into_response();
        }
    };

    if buffered.is_success() {
        state.response_cache.store(&key, &buffered.to_cache_bytes()).await;
    }
    buffered.with_header(CACHE_HEADER, "MISS").into_response()
}
