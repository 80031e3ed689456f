use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Which side of a comparison carried a bad vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSide {
    Stored,
    Probe,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or malformed request payload: {message}")]
    InvalidPayload { message: String },

    #[error("authentication token required")]
    AuthRequired,

    #[error("invalid authentication token")]
    InvalidToken,

    #[error("authentication token expired")]
    TokenExpired,

    #[error("caller has no tenant role")]
    AccessDenied,

    #[error("caller tenant does not own the target identity")]
    TenantIsolation,

    #[error("rate limit of {limit} attempts per {window:?} exceeded for identity")]
    RateLimitExceeded { limit: usize, window: Duration },

    #[error("current time falls outside the configured lecture window")]
    OutsideTimeWindow,

    #[error("no face detected in sample")]
    NoFaceDetected,

    #[error("found {count} faces; exactly one face required")]
    MultipleFaces { count: usize },

    #[error("face does not match stored embedding (confidence {confidence:.2})")]
    FaceMismatch { confidence: f64 },

    #[error("no embedding enrolled for student {student}")]
    FaceNotEnrolled { student: String },

    #[error("student not found")]
    StudentNotFound,

    #[error("{side:?} embedding has invalid shape: expected {expected} values, found {found}")]
    MalformedEmbedding {
        side: EmbeddingSide,
        expected: usize,
        found: usize,
    },

    #[error("verification did not complete within {deadline:?}")]
    FaceTimeout { deadline: Duration },

    #[error("attendance already recorded for this student today")]
    DuplicateAttendance,

    #[error("invalid student identity '{student}': {message}")]
    InvalidStudentId { student: String, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAttendance { .. } => AppError::DuplicateAttendance,
            StoreError::NotFound { .. } => AppError::StudentNotFound,
            StoreError::Forbidden => AppError::AccessDenied,
            StoreError::Backend(message) => AppError::Internal(message),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization error: {err}"))
    }
}
