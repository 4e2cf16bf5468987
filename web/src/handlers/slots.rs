//! Slot availability.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chairbook_core::slots::Slot;
use chairbook_core::types::ServiceId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Query string of the slots endpoint.
#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    /// Day to list, `YYYY-MM-DD`
    pub date: NaiveDate,
}

/// Slots of one service on one day.
#[derive(Debug, Serialize, Deserialize)]
pub struct SlotsResponse {
    /// Service asked for
    pub service_id: ServiceId,
    /// Day asked for
    pub date: NaiveDate,
    /// Ordered candidate starts
    pub slots: Vec<Slot>,
}

/// List candidate start times with their availability.
///
/// A closed or fully blocked day answers with an empty list.
///
/// ```bash
/// curl 'http://localhost:8080/api/services/550e8400-e29b-41d4-a716-446655440000/slots?date=2030-03-11'
/// ```
pub async fn list_slots(
    State(state): State<AppState>,
    Path(service_id): Path<ServiceId>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let slots = state
        .bookings
        .available_slots(service_id, query.date)
        .await?;
    Ok(Json(SlotsResponse {
        service_id,
        date: query.date,
        slots,
    }))
}
