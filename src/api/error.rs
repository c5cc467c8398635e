//! JSON error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Wire shape of every error response: `{"error": {"code", "message"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Handler error
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(&'static str),
    NotFound(String),
    NotConfigured(&'static str),
    RateLimited,
    /// Command reached the dispatcher but storage failed
    DispatchFailed(String),
    Upstream(String),
    Internal(String),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many requests".to_string(),
            ),
            Self::DispatchFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dispatch_failed", msg)
            }
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_failed", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Dispatch(msg) | Error::Config(msg) => Self::BadRequest(msg),
            Error::NotFound(msg) => Self::NotFound(msg),
            Error::Auth(_) => Self::Unauthorized("unknown user"),
            Error::Stt(msg) | Error::Tts(msg) => Self::Upstream(msg),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ApiErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
