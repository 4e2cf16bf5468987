//! Appointment endpoints:
//! - POST /api/appointments - Book a slot
//! - GET /api/appointments/:id - Load an appointment
//! - PATCH /api/appointments/:id/status - Move it through its lifecycle
//! - POST /api/appointments/:id/reschedule - Move it to another interval

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chairbook_core::types::{Appointment, AppointmentId, AppointmentStatus, CancellationOrigin};
use chairbook_runtime::BookingRequest;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    /// Target status
    pub status: AppointmentStatus,
    /// Cancellation reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Who cancels; staff when omitted
    #[serde(default)]
    pub origin: Option<CancellationOrigin>,
}

/// Body of a reschedule.
#[derive(Debug, Deserialize)]
pub struct Reschedule {
    /// New day
    pub date: NaiveDate,
    /// New start
    pub start: NaiveTime,
    /// New end
    pub end: NaiveTime,
}

/// Book a slot.
///
/// Answers 201 with the stored appointment, or 409 `SLOT_UNAVAILABLE` when
/// the interval was taken in the meantime.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/appointments \
///   -H 'content-type: application/json' \
///   -d '{"client_id":"...","service_id":"...","date":"2030-03-11","start":"10:00:00"}'
/// ```
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = state.bookings.book(request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Load one appointment.
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.bookings.appointment(id).await?))
}

/// Request a status transition.
///
/// `confirmed` on a `pending` appointment accepts its deposit. A
/// cancellation may name its `origin`.
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = match (change.status, change.origin) {
        (AppointmentStatus::Cancelled, Some(origin)) => {
            state.bookings.cancel(id, origin, change.reason).await?
        }
        (status, _) => state.bookings.change_status(id, status, change.reason).await?,
    };
    Ok(Json(appointment))
}

/// Move an appointment.
pub async fn reschedule(
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(target): Json<Reschedule>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .bookings
        .reschedule(id, target.date, target.start, target.end)
        .await?;
    Ok(Json(appointment))
}
