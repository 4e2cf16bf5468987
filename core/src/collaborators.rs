//! Outbound collaborators: notification delivery and calendar sync.
//!
//! Both are best-effort. The engine logs their failures and never lets
//! them roll back a booking, a status change or a settlement.

use crate::types::{Appointment, BookingCode, Contact};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The contact has no usable channel
    #[error("Contact has no email or phone")]
    Unreachable,

    /// The provider rejected or failed the delivery
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Calendar sync failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Calendar sync failed: {0}")]
pub struct CalendarSyncError(pub String);

/// Provider acknowledgement of a delivered message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    /// Provider message identifier
    pub message_id: String,
}

/// What a notification says about an appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentNotice {
    /// Client-facing code
    pub booking_code: BookingCode,
    /// Date
    pub date: NaiveDate,
    /// Start
    pub start: NaiveTime,
    /// End
    pub end: NaiveTime,
    /// Deposit must be paid by then
    pub deposit_due_by: Option<DateTime<Utc>>,
    /// Cancellation reason, for cancellation notices
    pub reason: Option<String>,
}

impl From<&Appointment> for AppointmentNotice {
    fn from(appointment: &Appointment) -> Self {
        Self {
            booking_code: appointment.booking_code.clone(),
            date: appointment.date,
            start: appointment.start,
            end: appointment.end,
            deposit_due_by: appointment.deposit_hold_expires_at,
            reason: appointment.cancellation_reason.clone(),
        }
    }
}

/// Sends client notifications (email, SMS, ...).
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Booking received.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails.
    async fn send_booking_confirmation(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError>;

    /// Deposit accepted, appointment confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails.
    async fn send_deposit_accepted(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError>;

    /// Appointment cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails.
    async fn send_cancellation(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError>;

    /// Upcoming appointment reminder.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails.
    async fn send_reminder(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError>;
}

/// Mirrors appointments into an external calendar.
#[async_trait]
pub trait CalendarSync: Send + Sync {
    /// Create or update the calendar event for `appointment`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarSyncError`] if the calendar rejects the update.
    async fn upsert_event(&self, appointment: &Appointment) -> Result<(), CalendarSyncError>;
}
