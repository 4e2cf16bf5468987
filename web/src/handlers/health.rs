//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Ready to take traffic
    pub ready: bool,
    /// Database reachable
    pub database: bool,
}

/// Simple health check endpoint (for basic liveness).
///
/// Does NOT check dependencies.
///
/// ```text
/// GET /health
/// {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness check: the store answers a ping.
///
/// # Status Codes
///
/// - 200 OK: the database is reachable
/// - 503 Service Unavailable: it is not
///
/// ```text
/// GET /ready
/// {"ready":true,"database":true}
/// ```
pub async fn readiness_check(
    State(state): State<AppState>,
) -> WebResult<Json<ReadinessResponse>> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
        })),
        Err(error) => {
            Err(AppError::unavailable("Database is not reachable").with_source(error.into()))
        }
    }
}
