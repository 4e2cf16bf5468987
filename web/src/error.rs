//! Error types for web handlers.
//!
//! [`AppError`] bridges the engine's domain errors and HTTP responses. The
//! body is always `{"code": ..., "message": ...}`; storage failures are
//! logged with their cause and answered with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chairbook_core::error::{BookingError, MembershipError, SettlementError, StoreError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Appointment>, AppError> {
///     let appointment = state.bookings.appointment(id).await?;
///     Ok(Json(appointment))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying cause (logged, never sent to the client).
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    fn domain(status: StatusCode, code: &'static str, message: impl fmt::Display) -> Self {
        Self::new(status, message.to_string(), code.to_string())
    }

    fn storage(err: StoreError) -> Self {
        let status = if err.is_retryable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(
            status,
            "An internal error occurred".to_string(),
            "STORAGE_ERROR".to_string(),
        )
        .with_source(anyhow::Error::new(err))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Request failed"
                );
            }
        } else {
            tracing::warn!(status = %self.status, code = %self.code, message = %self.message, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let code = err.code();
        match err {
            BookingError::Validation(message) => Self::domain(StatusCode::UNPROCESSABLE_ENTITY, code, message),
            BookingError::Conflict { .. } | BookingError::InvalidTransition { .. } => {
                Self::domain(StatusCode::CONFLICT, code, err)
            }
            BookingError::NotFound { .. } => Self::domain(StatusCode::NOT_FOUND, code, err),
            BookingError::Store(store) => Self::storage(store),
        }
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        let code = err.code();
        match err {
            SettlementError::Validation(message) => {
                Self::domain(StatusCode::UNPROCESSABLE_ENTITY, code, message)
            }
            SettlementError::NoEligibleCredit(_) | SettlementError::InsufficientStock { .. } => {
                Self::domain(StatusCode::UNPROCESSABLE_ENTITY, code, err)
            }
            SettlementError::NotFound { .. } => Self::domain(StatusCode::NOT_FOUND, code, err),
            SettlementError::AlreadySettled(_) | SettlementError::InvalidState { .. } => {
                Self::domain(StatusCode::CONFLICT, code, err)
            }
            SettlementError::Store(store) => Self::storage(store),
        }
    }
}

impl From<MembershipError> for AppError {
    fn from(err: MembershipError) -> Self {
        let code = err.code();
        match err {
            MembershipError::Validation(message) => {
                Self::domain(StatusCode::UNPROCESSABLE_ENTITY, code, message)
            }
            MembershipError::NotFound { .. } => Self::domain(StatusCode::NOT_FOUND, code, err),
            MembershipError::InvalidTransition { .. } => Self::domain(StatusCode::CONFLICT, code, err),
            MembershipError::Store(store) => Self::storage(store),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chairbook_core::types::{AppointmentId, AppointmentStatus, ClientId};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("Appointment", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Appointment with id 123 not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflicts_map_to_slot_unavailable() {
        let err: AppError = BookingError::Conflict {
            date: NaiveDate::MIN,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "SLOT_UNAVAILABLE");
    }

    #[test]
    fn invalid_transitions_are_conflicts() {
        let err: AppError = BookingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            action: "cancel",
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn booking_validation_keeps_its_message() {
        let err: AppError = BookingError::Validation("start is not a slot".into()).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] start is not a slot");
    }

    #[test]
    fn settlement_rejections_carry_their_codes() {
        let credit: AppError = SettlementError::NoEligibleCredit(ClientId::new()).into();
        assert_eq!(credit.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(credit.code(), "NO_ELIGIBLE_CREDIT");

        let settled: AppError = SettlementError::AlreadySettled(AppointmentId::new()).into();
        assert_eq!(settled.status(), StatusCode::CONFLICT);
        assert_eq!(settled.code(), "ALREADY_SETTLED");
    }

    #[test]
    fn storage_failures_do_not_leak() {
        let err: AppError =
            BookingError::Store(StoreError::Query("relation missing".into())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "[STORAGE_ERROR] An internal error occurred");
        assert!(std::error::Error::source(&err).is_some());

        let transient: AppError = StoreError::Connection("reset".into()).into();
        assert_eq!(transient.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
