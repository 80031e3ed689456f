use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::errors::{AppError, EmbeddingSide};

/// Stable machine-readable codes exposed at the boundary. The mapping
/// from internal errors is a total `match`; adding an error kind without
/// a code is a compile error, and no caller ever parses message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    AttendanceMarked,
    InvalidPayload,
    AuthRequired,
    InvalidToken,
    TokenExpired,
    AccessDenied,
    TenantIsolationViolation,
    RateLimitExceeded,
    OutsideTimeWindow,
    NoFaceDetected,
    MultipleFaces,
    FaceMismatch,
    FaceNotEnrolled,
    StudentNotFound,
    EncodingError,
    FaceTimeout,
    DuplicateAttendance,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AttendanceMarked => "ATTENDANCE_MARKED",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::TenantIsolationViolation => "TENANT_ISOLATION_VIOLATION",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::OutsideTimeWindow => "OUTSIDE_TIME_WINDOW",
            ErrorCode::NoFaceDetected => "NO_FACE_DETECTED",
            ErrorCode::MultipleFaces => "MULTIPLE_FACES",
            ErrorCode::FaceMismatch => "FACE_MISMATCH",
            ErrorCode::FaceNotEnrolled => "FACE_NOT_ENROLLED",
            ErrorCode::StudentNotFound => "STUDENT_NOT_FOUND",
            ErrorCode::EncodingError => "ENCODING_ERROR",
            ErrorCode::FaceTimeout => "FACE_TIMEOUT",
            ErrorCode::DuplicateAttendance => "DUPLICATE_ATTENDANCE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message for the code. Deliberately generic: internal
    /// detail (stack traces, store faults, embedding shapes) stays in the
    /// logs and never crosses the boundary.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::AttendanceMarked => "Attendance marked successfully.",
            ErrorCode::InvalidPayload => "Missing required parameters.",
            ErrorCode::AuthRequired => "Authentication token required.",
            ErrorCode::InvalidToken => "Invalid authentication token.",
            ErrorCode::TokenExpired => "Session expired. Please login again.",
            ErrorCode::AccessDenied => "Unauthorized access.",
            ErrorCode::TenantIsolationViolation => "Access to this resource is restricted.",
            ErrorCode::RateLimitExceeded => "Too many attempts. Try again after 1 minute.",
            ErrorCode::OutsideTimeWindow => "Attendance allowed only during lecture time.",
            ErrorCode::NoFaceDetected => "No face detected. Please look at the camera.",
            ErrorCode::MultipleFaces => "Exactly one face must be visible.",
            ErrorCode::FaceMismatch => "Face does not match registered student.",
            ErrorCode::FaceNotEnrolled => "No face registered for this student.",
            ErrorCode::StudentNotFound => "Student not found in database.",
            ErrorCode::EncodingError => "Face encoding data corrupted.",
            ErrorCode::FaceTimeout => "Face recognition service timeout.",
            ErrorCode::DuplicateAttendance => "Attendance already recorded for today.",
            ErrorCode::InternalError => "Internal server error.",
        }
    }

    /// Status hint for the excluded transport layer, mirroring the
    /// upstream contract (auth 401, scope 403, throttle 429, server-side
    /// faults 5xx).
    pub fn status_hint(&self) -> u16 {
        match self {
            ErrorCode::AttendanceMarked => 200,
            ErrorCode::InvalidPayload => 400,
            ErrorCode::AuthRequired | ErrorCode::InvalidToken | ErrorCode::TokenExpired => 401,
            ErrorCode::AccessDenied
            | ErrorCode::TenantIsolationViolation
            | ErrorCode::OutsideTimeWindow => 403,
            ErrorCode::StudentNotFound => 404,
            ErrorCode::RateLimitExceeded => 429,
            ErrorCode::NoFaceDetected
            | ErrorCode::MultipleFaces
            | ErrorCode::FaceMismatch
            | ErrorCode::FaceNotEnrolled
            | ErrorCode::DuplicateAttendance => 400,
            ErrorCode::EncodingError | ErrorCode::InternalError => 500,
            ErrorCode::FaceTimeout => 503,
        }
    }
}

impl From<&AppError> for ErrorCode {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::InvalidPayload { .. } | AppError::InvalidStudentId { .. } => {
                ErrorCode::InvalidPayload
            }
            AppError::AuthRequired => ErrorCode::AuthRequired,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::TokenExpired => ErrorCode::TokenExpired,
            AppError::AccessDenied => ErrorCode::AccessDenied,
            AppError::TenantIsolation => ErrorCode::TenantIsolationViolation,
            AppError::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            AppError::OutsideTimeWindow => ErrorCode::OutsideTimeWindow,
            AppError::NoFaceDetected => ErrorCode::NoFaceDetected,
            AppError::MultipleFaces { .. } => ErrorCode::MultipleFaces,
            AppError::FaceMismatch { .. } => ErrorCode::FaceMismatch,
            AppError::FaceNotEnrolled { .. } => ErrorCode::FaceNotEnrolled,
            AppError::StudentNotFound => ErrorCode::StudentNotFound,
            AppError::MalformedEmbedding {
                side: EmbeddingSide::Stored,
                ..
            } => ErrorCode::EncodingError,
            AppError::MalformedEmbedding {
                side: EmbeddingSide::Probe,
                ..
            } => ErrorCode::InternalError,
            AppError::FaceTimeout { .. } => ErrorCode::FaceTimeout,
            AppError::DuplicateAttendance => ErrorCode::DuplicateAttendance,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

/// Boundary envelope handed to the excluded transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub error_code: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip)]
    pub status_hint: u16,
}

impl ApiResponse {
    pub fn marked(confidence: f64) -> Self {
        let code = ErrorCode::AttendanceMarked;
        Self {
            success: true,
            error_code: code.as_str(),
            message: code.message(),
            confidence: Some(confidence),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            status_hint: code.status_hint(),
        }
    }

    pub fn failure(err: &AppError) -> Self {
        let code = ErrorCode::from(err);
        Self {
            success: false,
            error_code: code.as_str(),
            message: code.message(),
            confidence: None,
            timestamp: None,
            status_hint: code.status_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duplicate_attendance_maps_to_stable_code() {
        let response = ApiResponse::failure(&AppError::DuplicateAttendance);
        assert!(!response.success);
        assert_eq!(response.error_code, "DUPLICATE_ATTENDANCE");
        assert_eq!(response.message, "Attendance already recorded for today.");
        assert_eq!(response.status_hint, 400);
    }

    #[test]
    fn stored_side_shape_corruption_is_a_server_side_condition() {
        let err = AppError::MalformedEmbedding {
            side: EmbeddingSide::Stored,
            expected: 128,
            found: 127,
        };
        let response = ApiResponse::failure(&err);
        assert_eq!(response.error_code, "ENCODING_ERROR");
        assert_eq!(response.status_hint, 500);
    }

    #[test]
    fn probe_side_shape_violation_is_internal() {
        let err = AppError::MalformedEmbedding {
            side: EmbeddingSide::Probe,
            expected: 128,
            found: 3,
        };
        assert_eq!(ErrorCode::from(&err), ErrorCode::InternalError);
    }

    #[test]
    fn timeout_maps_to_service_unavailable() {
        let err = AppError::FaceTimeout {
            deadline: Duration::from_secs(2),
        };
        let response = ApiResponse::failure(&err);
        assert_eq!(response.error_code, "FACE_TIMEOUT");
        assert_eq!(response.message, "Face recognition service timeout.");
        assert_eq!(response.status_hint, 503);
    }

    #[test]
    fn rate_limit_maps_to_throttle_status() {
        let err = AppError::RateLimitExceeded {
            limit: 3,
            window: Duration::from_secs(60),
        };
        let response = ApiResponse::failure(&err);
        assert_eq!(response.error_code, "RATE_LIMIT_EXCEEDED");
        assert_eq!(response.status_hint, 429);
    }

    #[test]
    fn internal_detail_never_reaches_the_message() {
        let err = AppError::Internal("connection pool exhausted at 10.0.0.3".into());
        let response = ApiResponse::failure(&err);
        assert_eq!(response.message, "Internal server error.");
        assert!(!response.message.contains("10.0.0.3"));
    }

    #[test]
    fn success_envelope_carries_confidence_and_timestamp() {
        let response = ApiResponse::marked(93.2);
        assert!(response.success);
        assert_eq!(response.error_code, "ATTENDANCE_MARKED");
        assert_eq!(response.confidence, Some(93.2));
        assert!(response.timestamp.is_some());
    }
}
