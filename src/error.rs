//! Error taxonomy for the attendance engine and its HTTP mapping.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttendanceError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Office-mode attendance without resolvable coordinates, and similar setup gaps.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("You are {distance_meters:.0} meters away from the office, outside the allowed {radius_meters:.0} meter radius")]
    GeofenceViolation {
        distance_meters: f64,
        radius_meters: f64,
    },

    #[error("{0}")]
    StateConflict(String),

    /// Another writer updated the record first and retries ran out.
    #[error("record was modified concurrently, please retry")]
    VersionConflict,

    #[error("attendance decision timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;

impl AttendanceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GeofenceViolation { .. } => StatusCode::FORBIDDEN,
            Self::StateConflict(_) | Self::VersionConflict => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            Self::GeofenceViolation {
                distance_meters, ..
            } => HttpResponse::build(status).json(json!({
                "message": self.to_string(),
                "distance_meters": distance_meters.round(),
            })),
            Self::Storage(e) => {
                tracing::error!(error = %e, "Attendance storage failure");
                HttpResponse::build(status).json(json!({
                    "message": "Internal Server Error"
                }))
            }
            Self::Serialization(e) => {
                tracing::error!(error = %e, "Attendance serialization failure");
                HttpResponse::build(status).json(json!({
                    "message": "Internal Server Error"
                }))
            }
            _ => HttpResponse::build(status).json(json!({
                "message": self.to_string()
            })),
        }
    }
}
