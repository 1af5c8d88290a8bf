//! Buffered responses.
//!
//! Handlers produce streaming `Response`s. Middleware that needs the emitted
//! bytes (the response cache, mostly) first turns the response into a
//! `BufferedResponse`, inspects it, and turns it back into a `Response`.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

// == Buffered Response ==
/// A fully materialized response: status, headers and body bytes.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedResponse {
    // == Capture ==
    /// Reads the whole body of `response` into memory.
    pub async fn capture(response: Response) -> Result<Self, axum::Error> {
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await?;

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    // == Cache Encoding ==
    /// Serializes the response for the response cache.
    ///
    /// Layout: `"<status> <content-type>\n"` followed by the raw body. Other
    /// headers are not kept.
    pub fn to_cache_bytes(&self) -> Vec<u8> {
        let content_type = self
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let mut bytes = format!("{} {}\n", self.status.as_u16(), content_type).into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Rebuilds a response written by [`to_cache_bytes`](Self::to_cache_bytes).
    ///
    /// Returns None for bytes in any other shape.
    pub fn from_cache_bytes(bytes: Bytes) -> Option<Self> {
        let newline = bytes.iter().position(|b| *b == b'\n')?;
        let head = std::str::from_utf8(&bytes[..newline]).ok()?;
        let (status, content_type) = head.split_once(' ')?;
        let status = StatusCode::from_u16(status.parse().ok()?).ok()?;

        let mut headers = HeaderMap::new();
        if !content_type.is_empty() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).ok()?);
        }

        Some(Self {
            status,
            headers,
            body: bytes.slice(newline + 1..),
        })
    }

    /// True for 2xx statuses, the only ones worth caching.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Sets a header, replacing any existing value.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use serde_json::json;

    #[tokio::test]
    async fn test_capture_keeps_status_headers_and_body() {
        let original = (StatusCode::CREATED, Json(json!({"id": 7}))).into_response();

        let buffered = BufferedResponse::capture(original).await.unwrap();

        assert_eq!(buffered.status, StatusCode::CREATED);
        assert_eq!(
            buffered.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(&buffered.body[..], br#"{"id":7}"#);
        assert!(buffered.is_success());
    }

    #[tokio::test]
    async fn test_cached_response_keeps_status_and_content_type() {
        let original = (
            StatusCode::ACCEPTED,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "queued\nline two",
        )
            .into_response();
        let buffered = BufferedResponse::capture(original).await.unwrap();

        let restored = BufferedResponse::from_cache_bytes(Bytes::from(buffered.to_cache_bytes()))
            .unwrap()
            .with_header("x-cache", "HIT");

        let response = restored.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"queued\nline two");
    }

    #[test]
    fn test_missing_content_type_round_trips() {
        let buffered = BufferedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"[1,2]"),
        };

        let restored =
            BufferedResponse::from_cache_bytes(Bytes::from(buffered.to_cache_bytes())).unwrap();
        assert_eq!(restored.status, StatusCode::OK);
        assert!(restored.headers.get(header::CONTENT_TYPE).is_none());
        assert_eq!(&restored.body[..], b"[1,2]");
    }

    #[test]
    fn test_foreign_bytes_are_rejected() {
        for raw in [&b"no newline"[..], b"abc text/plain\nbody", b"999999 x\nbody", b""] {
            assert!(BufferedResponse::from_cache_bytes(Bytes::copy_from_slice(raw)).is_none());
        }
    }

    #[tokio::test]
    async fn test_error_status_is_not_success() {
        let original = (StatusCode::NOT_FOUND, "missing").into_response();
        let buffered = BufferedResponse::capture(original).await.unwrap();

        assert!(!buffered.is_success());
    }
}
