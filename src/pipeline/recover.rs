//! Panic recovery and request deadlines.
//!
//! Both stages run the rest of the chain on its own tokio task. A panic then
//! surfaces as a `JoinError` instead of unwinding through the server, and a
//! timed-out handler can be left running while the client gets its answer.

use std::any::Any;
use std::backtrace::Backtrace;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info_span, warn, Instrument};

use super::trace::TraceContext;
use crate::api::AppState;
use crate::models::ErrorResponse;

// == Recover Stage ==
/// Converts a panic anywhere further down the chain into a 500 response that
/// carries the trace id.
pub async fn recover(req: Request, next: Next) -> Response {
    let ctx = TraceContext::of(&req);
    let span = info_span!("request", trace_id = %ctx.trace_id);

    match tokio::spawn(next.run(req).instrument(span)).await {
        Ok(response) => response,
        Err(err) if err.is_panic() => {
            let payload = err.into_panic();
            let message = panic_message(&*payload);
            error!(
                trace_id = %ctx.trace_id,
                request_id = %ctx.request_id,
                panic = %message,
                "handler panicked"
            );
            internal_error(&ctx.trace_id)
        }
        Err(err) => {
            error!(trace_id = %ctx.trace_id, error = %err, "request task cancelled");
            internal_error(&ctx.trace_id)
        }
    }
}

fn internal_error(trace_id: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal Server Error", trace_id)),
    )
        .into_response()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Routes panic reports through `tracing`, with a captured backtrace.
///
/// Installed once at startup; replaces the default stderr printer.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        error!(panic = %info, backtrace = %backtrace, "panic");
    }));
}

// == Timeout Stage ==
/// Answers 408 once the configured deadline passes.
///
/// The handler task is detached, not aborted: it runs to completion and its
/// response is dropped.
pub async fn timeout(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ctx = TraceContext::of(&req);
    let deadline = state.config.request_timeout();

    let handle = tokio::spawn(next.run(req).in_current_span());
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Ok(Err(err)) => {
            error!(trace_id = %ctx.trace_id, error = %err, "request task cancelled");
            internal_error(&ctx.trace_id)
        }
        Err(_) => timed_out(&ctx, deadline),
    }
}

fn timed_out(ctx: &TraceContext, deadline: Duration) -> Response {
    warn!(
        trace_id = %ctx.trace_id,
        deadline_ms = deadline.as_millis() as u64,
        "request timed out"
    );
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(ErrorResponse::new("Request timeout", &ctx.trace_id)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let borrowed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*borrowed), "static message");

        let owned: Box<dyn Any + Send> = Box::new(String::from("formatted 7"));
        assert_eq!(panic_message(&*owned), "formatted 7");

        let other: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(&*other), "unknown panic payload");
    }
}
