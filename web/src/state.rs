//! Application state shared with handlers.

use chairbook_core::store::BookingStore;
use chairbook_runtime::{BookingService, EngineEnvironment, MembershipService, SettlementService};
use std::sync::Arc;

/// Services behind the HTTP surface.
///
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Slots, bookings, status changes and reschedules
    pub bookings: BookingService,
    /// Checkout
    pub settlements: SettlementService,
    /// Grant administration
    pub memberships: MembershipService,
    /// Persistence, for readiness checks
    pub store: Arc<dyn BookingStore>,
}

impl AppState {
    /// Build every service over one environment
    #[must_use]
    pub fn new(env: &EngineEnvironment) -> Self {
        Self::with_bookings(BookingService::new(env.clone()))
    }

    /// Use a preconfigured booking service (for example with a fixed code
    /// source); the other services share its environment.
    #[must_use]
    pub fn with_bookings(bookings: BookingService) -> Self {
        let env = bookings.environment().clone();
        Self {
            settlements: SettlementService::new(env.clone()),
            memberships: MembershipService::new(env.clone()),
            store: env.store,
            bookings,
        }
    }
}
