//! Development collaborators that log instead of delivering.
//!
//! The server binary wires these in until a mail/SMS provider and an
//! external calendar are configured.

use async_trait::async_trait;
use chairbook_core::collaborators::{
    AppointmentNotice, CalendarSync, CalendarSyncError, NotificationError, NotificationReceipt,
    NotificationSender,
};
use chairbook_core::types::{Appointment, Contact};
use tracing::info;
use uuid::Uuid;

/// Notification sender that writes each message to the log.
#[derive(Clone, Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Create a new console notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn deliver(
        kind: &'static str,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        let Some(to) = contact.email.as_deref().or(contact.phone.as_deref()) else {
            return Err(NotificationError::Unreachable);
        };
        let receipt = NotificationReceipt {
            message_id: Uuid::new_v4().to_string(),
        };
        info!(
            kind,
            to = %to,
            name = %contact.name,
            booking_code = %notice.booking_code,
            date = %notice.date,
            start = %notice.start,
            reason = notice.reason.as_deref(),
            message_id = %receipt.message_id,
            "Notification (development mode)"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl NotificationSender for ConsoleNotifier {
    async fn send_booking_confirmation(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        Self::deliver("booking_confirmation", contact, notice)
    }

    async fn send_deposit_accepted(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        Self::deliver("deposit_accepted", contact, notice)
    }

    async fn send_cancellation(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        Self::deliver("cancellation", contact, notice)
    }

    async fn send_reminder(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        Self::deliver("reminder", contact, notice)
    }
}

/// Calendar sync that logs each upsert.
#[derive(Clone, Debug, Default)]
pub struct ConsoleCalendar;

impl ConsoleCalendar {
    /// Create a new console calendar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CalendarSync for ConsoleCalendar {
    async fn upsert_event(&self, appointment: &Appointment) -> Result<(), CalendarSyncError> {
        info!(
            appointment_id = %appointment.id,
            date = %appointment.date,
            start = %appointment.start,
            end = %appointment.end,
            status = %appointment.status,
            "Calendar event upserted (development mode)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chairbook_core::types::BookingCode;
    use chrono::{NaiveDate, NaiveTime};

    fn notice() -> AppointmentNotice {
        AppointmentNotice {
            booking_code: BookingCode::from_string("ABCD2345".to_string()),
            date: NaiveDate::MIN,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
            deposit_due_by: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn phone_only_contacts_are_reachable() {
        let contact = Contact {
            name: "Cleo".to_string(),
            email: None,
            phone: Some("+15550101".to_string()),
        };
        let receipt = ConsoleNotifier::new()
            .send_reminder(&contact, &notice())
            .await;
        assert!(receipt.is_ok());
    }

    #[tokio::test]
    async fn contacts_without_channel_are_unreachable() {
        let contact = Contact {
            name: "Dan".to_string(),
            email: None,
            phone: None,
        };
        let result = ConsoleNotifier::new()
            .send_booking_confirmation(&contact, &notice())
            .await;
        assert_eq!(result, Err(NotificationError::Unreachable));
    }
}
