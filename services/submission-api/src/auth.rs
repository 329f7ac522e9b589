//! Bearer-token authentication for `POST /webhook`.

use async_trait::async_trait;
use axum::extract::{Extension, FromRequestParts};
use axum::http::request::Parts;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Marker extractor: presence means the request carried a valid bearer token.
pub struct BearerAuth;

/// Generic over `S` rather than bound to `Arc<AppState>`, since the app
/// state here is distributed via `Extension`, not `Router::with_state`.
#[async_trait]
impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state) = Extension::<Arc<AppState>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::unauthorized("Missing application state"))?;

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ApiError::unauthorized("Missing or invalid Authorization header")
            })?;

        if !constant_time_eq(token.as_bytes(), app_state.config.webhook_secret.as_bytes()) {
            return Err(ApiError::unauthorized("Invalid token"));
        }

        Ok(BearerAuth)
    }
}

/// Compares two byte strings in time independent of where they first
/// differ, guarding the bearer-token check against timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
