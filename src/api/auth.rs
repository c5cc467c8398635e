//! Request identification
//!
//! An optional bearer key guards the whole API; every handler that touches
//! user data also takes [`CurrentUser`], resolved from `X-User-Id`.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;

use super::{ApiError, ApiState, USER_ID_HEADER};

/// Extract API key from Authorization header
fn extract_api_key(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware to verify API key
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    // No key configured: development mode
    let Some(expected_key) = &state.api_key else {
        return next.run(req).await;
    };

    match extract_api_key(req.headers()) {
        Some(key) if key == expected_key.expose_secret() => next.run(req).await,
        Some(_) => {
            tracing::warn!("invalid API key provided");
            ApiError::Unauthorized("invalid API key").into_response()
        }
        None => {
            tracing::debug!("no API key provided");
            ApiError::Unauthorized("missing API key").into_response()
        }
    }
}

/// The existing user a request acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl FromRequestParts<Arc<ApiState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::Unauthorized("missing X-User-Id header"))?;

        match state.users.find(user_id)? {
            Some(user) => Ok(Self(user.id)),
            None => {
                tracing::debug!(user_id, "unknown user");
                Err(ApiError::Unauthorized("unknown user"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::*;

    #[test]
    fn test_extract_api_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer test-key-123"));
        assert_eq!(extract_api_key(&headers), Some("test-key-123"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_api_key(&headers), None);
    }
}
