//! Token Service
//!
//! Issues and validates HS256-signed identity tokens. Validity is decided by
//! signature, issuer and timestamps alone; there is no server-side state and
//! no revocation.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

// == Claims ==
/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Issued at, seconds since epoch
    pub iat: u64,
    /// Expires at, seconds since epoch
    pub exp: u64,
    /// Issuer
    pub iss: String,
}

// == Token Service ==
/// Issues and validates identity tokens with a symmetric secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    issuer: String,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    // == Constructor ==
    /// Creates a token service.
    ///
    /// # Arguments
    /// * `secret` - HMAC signing secret
    /// * `ttl` - Lifetime of issued tokens
    /// * `issuer` - Value of the `iss` claim, checked on validation
    pub fn new(secret: &[u8], ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            issuer: issuer.into(),
        }
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Issue ==
    /// Issues a token for `subject_id`, valid from now for the configured TTL.
    pub fn issue(&self, subject_id: &str) -> Result<String, AuthError> {
        let now = now_secs();
        let claims = Claims {
            sub: subject_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    // == Validate ==
    /// Validates `token` and returns its claims.
    ///
    /// Fails on a bad signature, malformed structure, foreign issuer, or once
    /// the current time has reached `exp`.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;

        // jsonwebtoken still accepts a token whose exp equals now
        if now_secs() >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }
}

// == Bearer Extraction ==
/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    match header.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::MissingToken),
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
