//! Router configuration.

use crate::handlers::{appointments, health, memberships, settlements, slots};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the API router.
///
/// - `/health`, `/ready`
/// - `/api/services/:id/slots`
/// - `/api/appointments` and its status and reschedule sub-resources
/// - `/api/settlements`
/// - `/api/memberships`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/services/:id/slots", get(slots::list_slots))
        .route("/appointments", post(appointments::create_appointment))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id/status", patch(appointments::change_status))
        .route("/appointments/:id/reschedule", post(appointments::reschedule))
        .route("/settlements", post(settlements::settle))
        .route("/memberships", post(memberships::activate_grant))
        .route("/memberships/:id/cancel", post(memberships::cancel_grant));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Router serving `/metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
