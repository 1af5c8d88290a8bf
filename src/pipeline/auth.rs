//! Bearer token authentication stage and the `CurrentUser` extractor.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::trace::TraceContext;
use crate::api::AppState;
use crate::auth::extract_bearer;
use crate::error::{AppError, AuthError};

/// Subject id of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
}

// == Authenticate Stage ==
/// Validates the bearer token, records the subject on the trace context and
/// makes it available to handlers as [`CurrentUser`]. Halts with 401.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = match extract_bearer(header).and_then(|token| state.tokens.validate(token)) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "authentication failed");
            return AppError::Unauthorized(err).into_response();
        }
    };

    if let Some(ctx) = req.extensions().get::<TraceContext>() {
        ctx.set_subject(claims.sub.clone());
    }
    req.extensions_mut().insert(CurrentUser { id: claims.sub });

    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized(AuthError::MissingToken))
    }
}
