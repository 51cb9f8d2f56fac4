//! Bearer token gate for the agent endpoint.
//!
//! The expected token is fixed at startup. A request passes only when its
//! `Authorization` header carries exactly that token; anything else is answered
//! with 401 before the handler (and so storage) is ever reached.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parlor_core::AgentResponse;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("invalid bearer token")]
    Invalid,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Bearer")],
            Json(AgentResponse::err("Invalid authentication token")),
        )
            .into_response()
    }
}

/// The single accepted credential.
#[derive(Clone)]
pub struct BearerToken(Arc<str>);

impl BearerToken {
    pub fn new(token: &str) -> Self {
        Self(Arc::from(token))
    }

    /// Check an `Authorization` header value against the expected token.
    pub fn verify(&self, header: Option<&HeaderValue>) -> Result<(), AuthError> {
        let value = header
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Missing)?;

        let (scheme, credential) = value.split_once(' ').ok_or(AuthError::Invalid)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::Invalid);
        }
        if credential != &*self.0 {
            return Err(AuthError::Invalid);
        }
        Ok(())
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// Axum middleware: reject unless the request carries the expected token.
pub async fn require_bearer(
    State(token): State<BearerToken>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(e) = token.verify(req.headers().get(AUTHORIZATION)) {
        tracing::warn!(path = %req.uri().path(), reason = %e, "Rejected unauthenticated request");
        return e.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn test_matching_token_passes() {
        let token = BearerToken::new("s3cret");
        assert_eq!(token.verify(Some(&header("Bearer s3cret"))), Ok(()));
        assert_eq!(token.verify(Some(&header("bearer s3cret"))), Ok(()));
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let token = BearerToken::new("s3cret");
        assert_eq!(token.verify(None), Err(AuthError::Missing));
    }

    #[test]
    fn test_comparison_is_exact() {
        let token = BearerToken::new("s3cret");
        for value in ["Bearer s3cret ", "Bearer S3CRET", "Bearer s3cre", "Basic s3cret", "s3cret"] {
            assert_eq!(
                token.verify(Some(&header(value))),
                Err(AuthError::Invalid),
                "{:?} should not authenticate",
                value
            );
        }
    }

    #[test]
    fn test_debug_hides_token() {
        let token = BearerToken::new("s3cret");
        assert!(!format!("{:?}", token).contains("s3cret"));
    }
}
