use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codeqa_rag::{RagError, ServiceErrorKind};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Error returned from a request handler, rendered as a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 500
    Internal(String),
    /// 502
    BadGateway(String),
    /// 503
    Unavailable(String),
    /// 504
    GatewayTimeout(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            Self::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "query failed: {message}");
        }
        let body = ErrorBody {
            error: error_type.into(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let message = err.to_string();
        match err {
            RagError::Input(_) => Self::BadRequest(message),
            RagError::Validation(_) | RagError::Config(_) => Self::Internal(message),
            RagError::Service { kind, .. } => match kind {
                ServiceErrorKind::Timeout => Self::GatewayTimeout(message),
                ServiceErrorKind::Unavailable | ServiceErrorKind::RateLimited => {
                    Self::Unavailable(message)
                }
                ServiceErrorKind::Network
                | ServiceErrorKind::Auth
                | ServiceErrorKind::Cancelled
                | ServiceErrorKind::Upstream => Self::BadGateway(message),
            },
        }
    }
}
