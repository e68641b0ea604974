use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{geometry::GeometryError, repository::RepositoryError};

/// ErrorBody
///
/// The JSON shape of every error response: `{"error": "<message>"}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// ApiError
///
/// Business and boundary failures raised by services and handlers. Each variant maps to
/// exactly one HTTP status. Token verification failures never appear here: the
/// authentication middleware absorbs them and the request simply continues anonymously.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No (valid) identity where one is required, or rejected login credentials.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated, but not the owner of the resource.
    #[error("{0}")]
    Forbidden(String),
    /// Duplicate registration.
    #[error("{0}")]
    Conflict(String),
    /// Malformed input: unknown role, invalid WKT, failed field validation.
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// Anything unexpected. The detail is logged, never sent to the client.
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn route_not_found(id: i64) -> Self {
        ApiError::NotFound(format!("Route not found: {}", id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed with internal error");
                "Internal server error".to_string()
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg) => msg,
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<GeometryError> for ApiError {
    fn from(err: GeometryError) -> Self {
        ApiError::BadRequest(format!("Invalid WKT: {}", err))
    }
}
