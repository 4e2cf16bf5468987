//! Checkout endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chairbook_core::types::{SettlementRecord, SettlementRequest};

/// Settle an appointment.
///
/// Answers 201 with the settlement record. Nothing is written when the
/// request is refused.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/settlements \
///   -H 'content-type: application/json' \
///   -d '{"appointment_id":"...","payment_method":"card",
///        "breakdown":{"service_cost":3000,"product_cost":0,"discount":0,"total":3000}}'
/// ```
pub async fn settle(
    State(state): State<AppState>,
    Json(request): Json<SettlementRequest>,
) -> Result<(StatusCode, Json<SettlementRecord>), AppError> {
    let record = state.settlements.settle(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
