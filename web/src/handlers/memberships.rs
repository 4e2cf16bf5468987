//! Membership grant endpoints:
//! - POST /api/memberships - Activate a grant
//! - POST /api/memberships/:id/cancel - Cancel a grant

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chairbook_core::types::{GrantId, MembershipGrant};
use chairbook_runtime::ActivateGrant;

/// Activate a grant of credits for a client.
pub async fn activate_grant(
    State(state): State<AppState>,
    Json(request): Json<ActivateGrant>,
) -> Result<(StatusCode, Json<MembershipGrant>), AppError> {
    let grant = state.memberships.activate_grant(request).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// Cancel an active grant; its remaining credits are forfeited.
pub async fn cancel_grant(
    State(state): State<AppState>,
    Path(id): Path<GrantId>,
) -> Result<Json<MembershipGrant>, AppError> {
    Ok(Json(state.memberships.cancel_grant(id).await?))
}
