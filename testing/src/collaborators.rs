//! Recording doubles for notifications, calendar sync and the event bus.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chairbook_core::collaborators::{
    AppointmentNotice, CalendarSync, CalendarSyncError, NotificationError, NotificationReceipt,
    NotificationSender,
};
use chairbook_core::events::{DomainEvent, EventBus, EventBusError, EventStream};
use chairbook_core::types::{Appointment, AppointmentId, Contact};
use futures::stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Which notification was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Booking received
    BookingConfirmation,
    /// Deposit accepted
    DepositAccepted,
    /// Cancelled
    Cancellation,
    /// Reminder
    Reminder,
}

/// A delivered notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentNotification {
    /// Kind
    pub kind: NotificationKind,
    /// Recipient
    pub contact: Contact,
    /// Content
    pub notice: AppointmentNotice,
}

/// Notification sender that records deliveries and can be told to fail.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failures_left: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    /// A notifier that always succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` delivery attempts
    #[must_use]
    pub fn failing(count: usize) -> Self {
        let notifier = Self::default();
        notifier.failures_left.store(count, Ordering::SeqCst);
        notifier
    }

    /// Deliveries so far
    #[must_use]
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    /// Deliveries of one kind
    #[must_use]
    pub fn sent_of(&self, kind: NotificationKind) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|notification| notification.kind == kind)
            .collect()
    }

    /// Attempts so far, including failed ones
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn deliver(
        &self,
        kind: NotificationKind,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotificationError::Delivery("provider unavailable".to_string()));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(SentNotification {
            kind,
            contact: contact.clone(),
            notice: notice.clone(),
        });
        Ok(NotificationReceipt {
            message_id: format!("msg-{}", sent.len()),
        })
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send_booking_confirmation(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.deliver(NotificationKind::BookingConfirmation, contact, notice)
    }

    async fn send_deposit_accepted(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.deliver(NotificationKind::DepositAccepted, contact, notice)
    }

    async fn send_cancellation(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.deliver(NotificationKind::Cancellation, contact, notice)
    }

    async fn send_reminder(
        &self,
        contact: &Contact,
        notice: &AppointmentNotice,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.deliver(NotificationKind::Reminder, contact, notice)
    }
}

/// Calendar sync that records upserts.
#[derive(Clone, Debug, Default)]
pub struct RecordingCalendar {
    upserts: Arc<Mutex<Vec<Appointment>>>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingCalendar {
    /// A calendar that always succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` upserts
    #[must_use]
    pub fn failing(count: usize) -> Self {
        let calendar = Self::default();
        calendar.failures_left.store(count, Ordering::SeqCst);
        calendar
    }

    /// Successful upserts so far
    #[must_use]
    pub fn upserts(&self) -> Vec<Appointment> {
        self.upserts.lock().unwrap().clone()
    }

    /// Upserts for one appointment
    #[must_use]
    pub fn upserts_for(&self, id: AppointmentId) -> Vec<Appointment> {
        self.upserts()
            .into_iter()
            .filter(|appointment| appointment.id == id)
            .collect()
    }
}

#[async_trait]
impl CalendarSync for RecordingCalendar {
    async fn upsert_event(&self, appointment: &Appointment) -> Result<(), CalendarSyncError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CalendarSyncError("calendar offline".to_string()));
        }
        self.upserts.lock().unwrap().push(appointment.clone());
        Ok(())
    }
}

/// Event bus that records every published event and fans it out to
/// subscribers.
#[derive(Clone, Debug)]
pub struct RecordingEventBus {
    published: Arc<Mutex<Vec<DomainEvent>>>,
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for RecordingEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEventBus {
    /// An empty bus
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            sender,
        }
    }

    /// Events published so far
    #[must_use]
    pub fn published(&self) -> Vec<DomainEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Names of the events published so far
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.published()
            .iter()
            .map(DomainEvent::event_type)
            .collect()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(
        &self,
        event: DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        Box::pin(async move {
            self.published.lock().unwrap().push(event.clone());
            // No subscribers is fine
            let _ = self.sender.send(event);
            Ok(())
        })
    }

    fn subscribe(&self) -> Result<EventStream, EventBusError> {
        let receiver = self.sender.subscribe();
        Ok(Box::pin(stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })))
    }
}
