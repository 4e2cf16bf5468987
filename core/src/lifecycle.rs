//! Appointment lifecycle state machine.
//!
//! Every status change goes through [`AppointmentReducer`]. Handlers build
//! an [`AppointmentAction`], run it against the stored appointment and
//! persist the result; they never write `status` directly.
//!
//! ```text
//!   create ──► pending ──┐
//!          ──► scheduled ┼──► confirmed ──► in_progress ──► completed
//!          ──► confirmed │        │                            ▲
//!                        │        └────── settle ──────────────┘
//!                        ├──► cancelled   (explicit or hold expiry)
//!                        └──► no_show     (scheduled / confirmed only)
//! ```
//!
//! `completed` and `cancelled` are terminal and `no_show` accepts nothing
//! further. A rejected action leaves the appointment untouched.

use crate::environment::Clock;
use crate::error::LifecycleError;
use crate::events::{DomainEvent, PreviousSlot};
use crate::reducer::Reducer;
use crate::types::{
    Appointment, AppointmentId, AppointmentStatus, BookingCode, CancellationOrigin, ClientId,
    CreationChannel, ServiceId,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

/// Reason recorded when the sweeper cancels a lapsed hold
pub const HOLD_EXPIRED_REASON: &str = "Deposit hold expired";

/// Commands accepted by the lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppointmentAction {
    /// Accept the deposit or confirm the booking
    Confirm,
    /// Cancel on someone's request
    Cancel {
        /// Who asked
        origin: CancellationOrigin,
        /// Why; defaults per origin
        reason: Option<String>,
    },
    /// Cancel a pending hold whose expiry has passed
    ExpireHold,
    /// Client is in the chair
    Start,
    /// Service finished
    Complete,
    /// Checkout committed
    Settle,
    /// Client did not show up
    MarkNoShow,
    /// Move to a new interval, keeping the status
    Reschedule {
        /// New date
        date: NaiveDate,
        /// New start
        start: NaiveTime,
        /// New end
        end: NaiveTime,
    },
    /// Reminder delivered
    MarkReminderSent,
}

impl AppointmentAction {
    /// Action that moves an appointment to `target` on staff request.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] for statuses that can only be
    /// reached at creation (`pending`, `scheduled`).
    pub fn for_target_status(
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<Self, LifecycleError> {
        match target {
            AppointmentStatus::Confirmed => Ok(Self::Confirm),
            AppointmentStatus::Cancelled => Ok(Self::Cancel {
                origin: CancellationOrigin::Staff,
                reason,
            }),
            AppointmentStatus::InProgress => Ok(Self::Start),
            AppointmentStatus::Completed => Ok(Self::Complete),
            AppointmentStatus::NoShow => Ok(Self::MarkNoShow),
            AppointmentStatus::Pending | AppointmentStatus::Scheduled => Err(
                LifecycleError::Validation(format!("status cannot be changed to {target}")),
            ),
        }
    }

    /// Verb used in error messages
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Cancel { .. } => "cancel",
            Self::ExpireHold => "expire",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Settle => "settle",
            Self::MarkNoShow => "mark as no-show",
            Self::Reschedule { .. } => "reschedule",
            Self::MarkReminderSent => "remind",
        }
    }

    /// Statuses the action is accepted from
    const fn allowed_from(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::{Confirmed, InProgress, Pending, Scheduled};
        match self {
            Self::Confirm => &[Pending, Scheduled],
            Self::Cancel { .. } | Self::Reschedule { .. } | Self::MarkReminderSent => {
                &[Pending, Scheduled, Confirmed]
            }
            Self::ExpireHold => &[Pending],
            Self::Start | Self::MarkNoShow => &[Scheduled, Confirmed],
            Self::Complete => &[InProgress],
            Self::Settle => &[Pending, Scheduled, Confirmed, InProgress],
        }
    }
}

/// Dependencies of the lifecycle reducer.
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl LifecycleEnvironment {
    /// Environment backed by `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// The appointment state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppointmentReducer;

impl Reducer for AppointmentReducer {
    type State = Appointment;
    type Action = AppointmentAction;
    type Environment = LifecycleEnvironment;
    type Event = DomainEvent;
    type Error = LifecycleError;

    fn reduce(
        &self,
        state: &mut Appointment,
        action: AppointmentAction,
        env: &LifecycleEnvironment,
    ) -> Result<SmallVec<[DomainEvent; 2]>, LifecycleError> {
        if !action.allowed_from().contains(&state.status) {
            return Err(LifecycleError::InvalidTransition {
                from: state.status,
                action: action.verb(),
            });
        }

        let now = env.clock.now();

        let event = match action {
            AppointmentAction::Confirm => {
                if state.hold_expired(now) {
                    return Err(LifecycleError::InvalidTransition {
                        from: state.status,
                        action: "confirm a lapsed hold on",
                    });
                }
                let deposit_accepted = state.deposit_required && !state.deposit_paid;
                if state.deposit_required {
                    state.deposit_paid = true;
                }
                state.deposit_hold_expires_at = None;
                state.status = AppointmentStatus::Confirmed;
                state.updated_at = now;
                DomainEvent::AppointmentConfirmed {
                    appointment: state.clone(),
                    deposit_accepted,
                }
            }
            AppointmentAction::Cancel { origin, reason } => {
                let reason = reason
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| origin.default_reason().to_string());
                cancel(state, origin, reason, now)
            }
            AppointmentAction::ExpireHold => {
                if !state.hold_expired(now) {
                    return Err(LifecycleError::Validation(
                        "deposit hold has not expired".to_string(),
                    ));
                }
                cancel(
                    state,
                    CancellationOrigin::System,
                    HOLD_EXPIRED_REASON.to_string(),
                    now,
                )
            }
            AppointmentAction::Start => {
                state.status = AppointmentStatus::InProgress;
                state.updated_at = now;
                DomainEvent::AppointmentStarted {
                    appointment: state.clone(),
                }
            }
            AppointmentAction::Complete | AppointmentAction::Settle => {
                state.status = AppointmentStatus::Completed;
                state.deposit_hold_expires_at = None;
                state.updated_at = now;
                DomainEvent::AppointmentCompleted {
                    appointment: state.clone(),
                }
            }
            AppointmentAction::MarkNoShow => {
                state.status = AppointmentStatus::NoShow;
                state.updated_at = now;
                DomainEvent::AppointmentNoShow {
                    appointment: state.clone(),
                }
            }
            AppointmentAction::Reschedule { date, start, end } => {
                if start >= end {
                    return Err(LifecycleError::Validation(format!(
                        "start {start} must be before end {end}"
                    )));
                }
                let previous = PreviousSlot {
                    date: state.date,
                    start: state.start,
                    end: state.end,
                };
                state.date = date;
                state.start = start;
                state.end = end;
                state.reminder_sent = false;
                state.updated_at = now;
                DomainEvent::AppointmentRescheduled {
                    appointment: state.clone(),
                    previous,
                }
            }
            AppointmentAction::MarkReminderSent => {
                if state.reminder_sent {
                    return Ok(SmallVec::new());
                }
                state.reminder_sent = true;
                state.updated_at = now;
                DomainEvent::ReminderSent {
                    appointment_id: state.id,
                }
            }
        };

        Ok(smallvec![event])
    }
}

fn cancel(
    state: &mut Appointment,
    origin: CancellationOrigin,
    reason: String,
    now: DateTime<Utc>,
) -> DomainEvent {
    state.status = AppointmentStatus::Cancelled;
    state.cancellation_reason = Some(reason);
    state.deposit_hold_expires_at = None;
    state.updated_at = now;
    DomainEvent::AppointmentCancelled {
        appointment: state.clone(),
        origin,
    }
}

/// Everything needed to open a new appointment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAppointment {
    /// Client
    pub client_id: ClientId,
    /// Service
    pub service_id: ServiceId,
    /// Date
    pub date: NaiveDate,
    /// Start
    pub start: NaiveTime,
    /// End
    pub end: NaiveTime,
    /// Channel
    pub channel: CreationChannel,
    /// Notes
    pub notes: Option<String>,
    /// Paid in full at booking time
    pub full_payment: bool,
    /// A deposit is required from this client
    pub deposit_required: bool,
    /// Client-facing code
    pub booking_code: BookingCode,
}

/// Status a new appointment starts in.
#[must_use]
pub const fn initial_status(full_payment: bool, deposit_required: bool) -> AppointmentStatus {
    if full_payment {
        AppointmentStatus::Confirmed
    } else if deposit_required {
        AppointmentStatus::Pending
    } else {
        AppointmentStatus::Scheduled
    }
}

/// Build a new appointment in its initial status.
///
/// A `pending` appointment gets a hold that lapses `hold` after `now`.
#[must_use]
pub fn open_appointment(new: NewAppointment, now: DateTime<Utc>, hold: Duration) -> Appointment {
    let status = initial_status(new.full_payment, new.deposit_required);
    let deposit_hold_expires_at = (status == AppointmentStatus::Pending).then(|| now + hold);

    Appointment {
        id: AppointmentId::new(),
        booking_code: new.booking_code,
        client_id: new.client_id,
        service_id: new.service_id,
        date: new.date,
        start: new.start,
        end: new.end,
        status,
        channel: new.channel,
        deposit_required: new.deposit_required,
        deposit_paid: new.full_payment && new.deposit_required,
        deposit_hold_expires_at,
        reminder_sent: false,
        cancellation_reason: None,
        notes: new.notes,
        created_at: now,
        updated_at: now,
    }
}
