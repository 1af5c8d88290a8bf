//! Per-request trace context and the stages that create it.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// == Trace Context ==
/// Identity of one in-flight request.
///
/// Created by the trace stage and carried in the request extensions. Clones
/// share the subject slot, so an outer stage holding a clone sees the subject
/// recorded later by authentication.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub request_id: String,
    pub started_at: Instant,
    subject: Arc<OnceLock<String>>,
}

impl TraceContext {
    /// Fresh context with random trace and request ids.
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            request_id: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            subject: Arc::new(OnceLock::new()),
        }
    }

    /// Context of `req`, or a fresh one when the trace stage did not run.
    pub fn of(req: &Request) -> Self {
        req.extensions().get::<Self>().cloned().unwrap_or_default()
    }

    /// Records the authenticated subject. Only the first call has effect.
    pub fn set_subject(&self, subject: impl Into<String>) {
        let _ = self.subject.set(subject.into());
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.get().map(String::as_str)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

// == Trace Stage ==
/// Attaches a new [`TraceContext`] and reports its trace id as `X-Trace-ID`.
pub async fn trace(mut req: Request, next: Next) -> Response {
    let ctx = TraceContext::new();
    let trace_id = ctx.trace_id.clone();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    set_header(response.headers_mut(), TRACE_ID_HEADER, &trace_id);
    response
}

// == Request Id Stage ==
/// Adopts the caller's `X-Request-ID` when present and echoes the final id.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let incoming = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let request_id = match req.extensions_mut().get_mut::<TraceContext>() {
        Some(ctx) => {
            if let Some(id) = incoming {
                ctx.request_id = id;
            }
            ctx.request_id.clone()
        }
        None => incoming.unwrap_or_else(|| Uuid::new_v4().to_string()),
    };

    let mut response = next.run(req).await;
    set_header(response.headers_mut(), REQUEST_ID_HEADER, &request_id);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let a = TraceContext::new();
        let b = TraceContext::new();
        assert_ne!(a.trace_id, b.trace_id);
        assert_ne!(a.trace_id, a.request_id);
    }

    #[test]
    fn test_subject_is_shared_between_clones() {
        let ctx = TraceContext::new();
        let outer = ctx.clone();
        assert_eq!(outer.subject(), None);

        ctx.set_subject("42");
        ctx.set_subject("43");
        assert_eq!(outer.subject(), Some("42"));
    }

    #[test]
    fn test_of_falls_back_to_fresh_context() {
        let req = Request::new(axum::body::Body::empty());
        let ctx = TraceContext::of(&req);
        assert!(!ctx.trace_id.is_empty());
    }
}
