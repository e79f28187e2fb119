//! Bearer-token gate for the protected routes.
//!
//! The configured key is hashed once at startup; each request hashes the
//! presented token and compares digests in constant time.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use repairs_core::config::Secret;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::http::ApiError;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    InvalidScheme,
    InvalidKey,
}

impl AuthFailure {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingHeader => "Missing Authorization header.",
            Self::InvalidScheme => "Invalid authorization scheme.",
            Self::InvalidKey => "Invalid API key.",
        }
    }
}

#[derive(Clone)]
pub struct ApiKeyGate {
    expected: Arc<[u8; 32]>,
}

impl ApiKeyGate {
    #[must_use]
    pub fn new(api_key: &Secret) -> Self {
        Self {
            expected: Arc::new(digest(api_key.expose())),
        }
    }

    /// Check the `Authorization` header of a request.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthFailure`] describing the first problem found.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthFailure> {
        let token = bearer_token(headers)?;
        if bool::from(digest(token)[..].ct_eq(&self.expected[..])) {
            Ok(())
        } else {
            Err(AuthFailure::InvalidKey)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AuthFailure::MissingHeader)?;

    // A scheme without a token is not a bearer credential.
    let (scheme, token) = authz.split_once(' ').ok_or(AuthFailure::InvalidScheme)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthFailure::InvalidScheme);
    }
    Ok(token.trim())
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Axum middleware rejecting requests without the configured bearer token.
pub async fn require_api_key(
    State(gate): State<ApiKeyGate>,
    request: Request,
    next: Next,
) -> Response {
    match gate.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(failure) => {
            debug!(?failure, path = %request.uri().path(), "rejected request");
            ApiError::unauthorized(failure.message()).into_response()
        }
    }
}
