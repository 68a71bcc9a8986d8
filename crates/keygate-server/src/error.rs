use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keygate_core::KeygateError;
use serde_json::json;

/// A transport-level failure: malformed input, authorization refusal or a
/// store fault. Domain outcomes are not errors; they travel as
/// `ResultCode`s inside a 200 envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, "request failed: {}", self.message);
        }
        let body = json!({
            "success": false,
            "code": self.code,
            "message": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<KeygateError> for ApiError {
    fn from(err: KeygateError) -> Self {
        match &err {
            KeygateError::Storage(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                err.to_string(),
            ),
            KeygateError::Credential(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CREDENTIAL_ERROR",
                err.to_string(),
            ),
            KeygateError::NotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            KeygateError::InvalidRequest(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.to_string())
            }
            KeygateError::Conflict(_) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", err.to_string())
            }
            KeygateError::Forbidden(_) => {
                ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
            }
            KeygateError::InternalError(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        }
    }
}
