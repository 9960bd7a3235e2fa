//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use linescript_domain::error::{ConflictError, LineScriptError, NotFoundError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`LineScriptError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(LineScriptError);

impl From<LineScriptError> for ApiError {
    fn from(err: LineScriptError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        Self(err.into())
    }
}

impl From<ConflictError> for ApiError {
    fn from(err: ConflictError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            LineScriptError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            LineScriptError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            LineScriptError::Conflict(err) => (StatusCode::CONFLICT, err.to_string()),
            err @ (LineScriptError::Compile(_) | LineScriptError::Runtime(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            LineScriptError::Transport(err) => {
                tracing::error!(error = %err, "transport error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
