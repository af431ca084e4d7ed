//! Bearer-token gate for the versioned API namespace.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use super::server::AppState;
use crate::config::AuthConfig;
use crate::error::Error;

/// Paths under this prefix require the master key.
pub const API_PREFIX: &str = "/v1/";

/// Check an `Authorization` header value against the configured master key.
///
/// An open configuration (master key `"1"`) accepts anything, including a
/// missing header. Otherwise the trimmed value must be exactly
/// `Bearer <master-key>`.
pub fn is_authorized(auth: &AuthConfig, authorization: Option<&str>) -> bool {
    if auth.is_open() {
        return true;
    }
    match authorization {
        Some(value) => {
            value.trim().strip_prefix("Bearer ") == Some(auth.master_key.expose_secret())
        }
        None => false,
    }
}

/// Auth middleware: reject `/v1/*` requests without the master key.
pub async fn require_master_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    if !request.uri().path().starts_with(API_PREFIX) {
        return Ok(next.run(request).await);
    }

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if is_authorized(&state.config.auth, authorization) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            path = %request.uri().path(),
            header_present = authorization.is_some(),
            "Unauthorized API request - missing or invalid token"
        );
        Err(Error::Unauthorized)
    }
}
