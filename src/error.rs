use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    state::{board::SlotError, timer::TimerStateError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend rejected an operation.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No storage backend is installed yet.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Every slot is occupied; the session cannot start.
    #[error("all {capacity} slots are occupied")]
    NoCapacity {
        /// Number of slots on the board.
        capacity: usize,
    },
    /// The student is not in the waiting queue (already seated or finished).
    #[error("student `{student_id}` is not in the waiting queue")]
    NotWaiting {
        /// Student the operation targeted.
        student_id: Uuid,
    },
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A board invariant was violated; this is a bug, not a user error.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SlotError> for ServiceError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NoCapacity { capacity } => ServiceError::NoCapacity { capacity },
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<TimerStateError> for ServiceError {
    fn from(err: TimerStateError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::NoCapacity { capacity } => {
                AppError::Conflict(format!("all {capacity} slots are occupied"))
            }
            ServiceError::NotWaiting { student_id } => {
                AppError::Conflict(format!("student `{student_id}` is not in the waiting queue"))
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
