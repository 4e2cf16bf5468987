//! Domain events and the bus they are published on.
//!
//! Events are facts emitted by the lifecycle reducer and the settlement
//! transaction. They are published only after the owning transaction has
//! committed; notification and calendar collaborators subscribe to them, so
//! a collaborator failure can never roll back a booking or a settlement.

use crate::types::{Appointment, AppointmentId, CancellationOrigin, SettlementRecord};
use chrono::{NaiveDate, NaiveTime};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Where an appointment sat before it was moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousSlot {
    /// Previous date
    pub date: NaiveDate,
    /// Previous start
    pub start: NaiveTime,
    /// Previous end
    pub end: NaiveTime,
}

/// Facts about appointments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// A new appointment was reserved
    AppointmentBooked {
        /// Snapshot after booking
        appointment: Appointment,
    },
    /// The appointment was confirmed
    AppointmentConfirmed {
        /// Snapshot after confirmation
        appointment: Appointment,
        /// Confirmation accepted an outstanding deposit
        deposit_accepted: bool,
    },
    /// The appointment was cancelled
    AppointmentCancelled {
        /// Snapshot after cancellation
        appointment: Appointment,
        /// Who cancelled it
        origin: CancellationOrigin,
    },
    /// The appointment moved to a new interval
    AppointmentRescheduled {
        /// Snapshot after the move
        appointment: Appointment,
        /// Interval before the move
        previous: PreviousSlot,
    },
    /// Service started
    AppointmentStarted {
        /// Snapshot after the change
        appointment: Appointment,
    },
    /// Client did not show up
    AppointmentNoShow {
        /// Snapshot after the change
        appointment: Appointment,
    },
    /// The appointment reached `completed`
    AppointmentCompleted {
        /// Snapshot after completion
        appointment: Appointment,
    },
    /// Checkout committed
    AppointmentSettled {
        /// Snapshot after settlement
        appointment: Appointment,
        /// The settlement record
        settlement: SettlementRecord,
    },
    /// A reminder was delivered
    ReminderSent {
        /// Reminded appointment
        appointment_id: AppointmentId,
    },
}

impl DomainEvent {
    /// Stable event name
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::AppointmentBooked { .. } => "AppointmentBooked",
            Self::AppointmentConfirmed { .. } => "AppointmentConfirmed",
            Self::AppointmentCancelled { .. } => "AppointmentCancelled",
            Self::AppointmentRescheduled { .. } => "AppointmentRescheduled",
            Self::AppointmentStarted { .. } => "AppointmentStarted",
            Self::AppointmentNoShow { .. } => "AppointmentNoShow",
            Self::AppointmentCompleted { .. } => "AppointmentCompleted",
            Self::AppointmentSettled { .. } => "AppointmentSettled",
            Self::ReminderSent { .. } => "ReminderSent",
        }
    }

    /// Appointment snapshot carried by the event, if any
    #[must_use]
    pub const fn appointment(&self) -> Option<&Appointment> {
        match self {
            Self::AppointmentBooked { appointment }
            | Self::AppointmentConfirmed { appointment, .. }
            | Self::AppointmentCancelled { appointment, .. }
            | Self::AppointmentRescheduled { appointment, .. }
            | Self::AppointmentStarted { appointment }
            | Self::AppointmentNoShow { appointment }
            | Self::AppointmentCompleted { appointment }
            | Self::AppointmentSettled { appointment, .. } => Some(appointment),
            Self::ReminderSent { .. } => None,
        }
    }

    /// Identifier of the appointment the event is about
    #[must_use]
    pub const fn appointment_id(&self) -> AppointmentId {
        match self {
            Self::AppointmentBooked { appointment }
            | Self::AppointmentConfirmed { appointment, .. }
            | Self::AppointmentCancelled { appointment, .. }
            | Self::AppointmentRescheduled { appointment, .. }
            | Self::AppointmentStarted { appointment }
            | Self::AppointmentNoShow { appointment }
            | Self::AppointmentCompleted { appointment }
            | Self::AppointmentSettled { appointment, .. } => appointment.id,
            Self::ReminderSent { appointment_id } => *appointment_id,
        }
    }
}

/// Errors from event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to publish
    #[error("Publish failed for {event_type}: {reason}")]
    PublishFailed {
        /// Event that failed
        event_type: &'static str,
        /// Why
        reason: String,
    },

    /// Failed to subscribe
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
}

/// Stream of events delivered to a subscriber.
pub type EventStream = Pin<Box<dyn Stream<Item = DomainEvent> + Send>>;

/// Publish/subscribe boundary between the engine and its collaborators.
///
/// Uses explicit boxed futures so the bus can be shared as
/// `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish a committed event.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the event could not be
    /// handed to the transport.
    fn publish(
        &self,
        event: DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to every event published from now on.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(&self) -> Result<EventStream, EventBusError>;
}
