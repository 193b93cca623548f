use actix_web::{HttpResponse, http::StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Everything the attendance lifecycle can reject with. All variants are
/// recoverable caller errors except `Store`, which wraps a backend failure.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("Already clocked in today")]
    AlreadyClockedIn,
    #[error("No attendance record found for today")]
    NoActiveAttendance,
    #[error("No active break found")]
    NoActiveBreak,
    #[error("A break is already in progress")]
    BreakAlreadyOpen,
    #[error("No active clock-in found for today")]
    NoActiveClockIn,
    #[error("Attendance record not found")]
    NotFound,
    #[error("Attendance already recorded for this staff member today")]
    DuplicateAttendance,
    #[error("{0}")]
    Validation(String),
    #[error("storage failure")]
    Store(#[source] anyhow::Error),
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AttendanceError::NotFound,
            StoreError::DuplicateDay => AttendanceError::DuplicateAttendance,
            // An id collision that escaped the retry loop still means the
            // day slot is contested.
            StoreError::DuplicateId => AttendanceError::DuplicateAttendance,
            StoreError::Backend(e) => AttendanceError::Store(e),
        }
    }
}

impl actix_web::ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::AlreadyClockedIn
            | AttendanceError::NoActiveBreak
            | AttendanceError::BreakAlreadyOpen
            | AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
            AttendanceError::NoActiveAttendance
            | AttendanceError::NoActiveClockIn
            | AttendanceError::NotFound => StatusCode::NOT_FOUND,
            AttendanceError::DuplicateAttendance => StatusCode::CONFLICT,
            AttendanceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AttendanceError::Store(e) = self {
            error!(error = %e, "Attendance storage failure");
            return HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }));
        }
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}
