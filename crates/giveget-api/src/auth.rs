//! Bearer token authentication.
//!
//! Every negotiation route takes a [`Principal`], which is resolved from the
//! `Authorization: Bearer <token>` header through the configured
//! [`IdentityResolver`]. Request bodies never carry the acting user.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use giveget_core::identity::IdentityResolver;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing::debug;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Verifies HS256 JWTs whose `sub` claim is the numeric user id.
pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: serde_json::Value,
}

impl JwtIdentityResolver {
    /// Creates a resolver for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(&self, token: &str) -> Option<i64> {
        let data = match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                return None;
            }
        };
        let user_id = match &data.claims.sub {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        };
        user_id.filter(|id| *id > 0)
    }
}

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub i64);

/// Rejection returned when no valid bearer token is present.
#[derive(Debug)]
pub struct AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: "unauthenticated",
            message: "a valid bearer token is required".to_owned(),
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError)?;

        state.identity.resolve(token).map(Principal).ok_or(AuthError)
    }
}
