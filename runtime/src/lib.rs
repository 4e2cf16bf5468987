//! # Chairbook Runtime
//!
//! The imperative shell around `chairbook-core`. Services here own the
//! transaction boundaries: they read, open a [`StoreTransaction`], run the
//! pure rules and the [`AppointmentReducer`], write, commit, and only then
//! publish [`DomainEvent`]s.
//!
//! - [`booking`]: slot queries, reservations, status changes, reschedules
//! - [`settlement`]: atomic checkout (credit, stock, ledger, visit stats)
//! - [`membership`]: grant activation and cancellation
//! - [`sweeper`]: cancels pending appointments whose deposit hold lapsed
//! - [`reminders`]: sends reminders ahead of upcoming appointments
//! - [`dispatch`]: event bus and collaborator delivery
//!
//! [`StoreTransaction`]: chairbook_core::store::StoreTransaction
//! [`AppointmentReducer`]: chairbook_core::lifecycle::AppointmentReducer

use chairbook_core::environment::Clock;
use chairbook_core::events::{DomainEvent, EventBus};
use chairbook_core::lifecycle::LifecycleEnvironment;
use chairbook_core::settings::EngineSettings;
use chairbook_core::store::{BookingStore, StoreTransaction};
use chrono::NaiveDateTime;
use std::sync::Arc;

pub mod booking;
pub mod dispatch;
pub mod guard;
pub mod membership;
pub mod metrics;
pub mod reminders;
pub mod retry;
pub mod settlement;
pub mod sweeper;

pub use booking::{BookingRequest, BookingService};
pub use dispatch::{BroadcastEventBus, CollaboratorDispatcher};
pub use membership::{ActivateGrant, MembershipService};
pub use reminders::{ReminderJob, ReminderReport};
pub use settlement::SettlementService;
pub use sweeper::{DepositExpirySweeper, SweepReport};

/// Everything a service needs from the outside world.
#[derive(Clone)]
pub struct EngineEnvironment {
    /// Persistence
    pub store: Arc<dyn BookingStore>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Post-commit event sink
    pub events: Arc<dyn EventBus>,
    /// Business policy
    pub settings: EngineSettings,
}

impl EngineEnvironment {
    /// Bundle the dependencies
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventBus>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            settings,
        }
    }

    /// Environment for [`AppointmentReducer`](chairbook_core::lifecycle::AppointmentReducer)
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleEnvironment {
        LifecycleEnvironment::new(Arc::clone(&self.clock))
    }

    /// Current wall-clock time in business-local terms
    #[must_use]
    pub fn local_now(&self) -> NaiveDateTime {
        self.settings.local_now(self.clock.now())
    }

    /// Publish committed events. Failures are logged, never returned.
    pub async fn publish_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            let event_type = event.event_type();
            let appointment_id = event.appointment_id();
            if let Err(error) = self.events.publish(event).await {
                tracing::warn!(
                    event_type,
                    appointment_id = %appointment_id,
                    error = %error,
                    "Failed to publish event"
                );
            }
        }
    }
}

/// Roll back `tx`, logging instead of returning a failure so the caller's
/// original error survives.
pub(crate) async fn abandon(tx: Box<dyn StoreTransaction>) {
    if let Err(error) = tx.rollback().await {
        tracing::warn!(error = %error, "Rollback failed");
    }
}
