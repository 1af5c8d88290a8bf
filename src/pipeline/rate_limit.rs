//! Rate limiting stage.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::trace::TraceContext;
use crate::api::AppState;
use crate::error::AppError;
use crate::ratelimit::RateDecision;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Key used when the peer address is unknown (e.g. in-process tests).
const UNKNOWN_CLIENT: &str = "unknown";

/// Client key for `req`: the peer IP address.
pub fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn decorate(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining()));
}

// == Rate Limit Stage ==
/// Admits the request if its client is within budget.
///
/// Over budget halts with 429. A store failure halts with 500; the request is
/// neither admitted nor counted as rejected.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    let limit = state.config.rate_limit_requests;
    let window = state.config.rate_limit_window();

    let decision = match state.rate_limiter.check(&key, limit, window).await {
        Ok(decision) => decision,
        Err(err) => {
            let ctx = TraceContext::of(&req);
            warn!(trace_id = %ctx.trace_id, client = %key, error = %err, "rate limiter store failure");
            return AppError::RateLimitStore(err).into_response();
        }
    };

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        AppError::RateLimited.into_response()
    };
    decorate(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_key_uses_peer_ip() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 51234))));
        assert_eq!(client_key(&req), "10.0.0.7");
    }

    #[test]
    fn test_client_key_without_peer() {
        let req = Request::new(Body::empty());
        assert_eq!(client_key(&req), "unknown");
    }

    #[test]
    fn test_decorate_headers() {
        let mut headers = HeaderMap::new();
        let decision = RateDecision {
            allowed: true,
            count: 3,
            limit: 10,
        };
        decorate(&mut headers, &decision);
        assert_eq!(headers[LIMIT_HEADER], "10");
        assert_eq!(headers[REMAINING_HEADER], "7");
    }
}
