//! Event dispatch.
//!
//! [`BroadcastEventBus`] fans committed events out to in-process
//! subscribers. [`CollaboratorDispatcher`] is one such subscriber: it turns
//! events into notifications and calendar upserts. Deliveries are retried
//! with backoff, then logged and counted; they never reach the caller whose
//! request produced the event.

use crate::metrics::JobMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use chairbook_core::collaborators::{AppointmentNotice, CalendarSync, NotificationSender};
use chairbook_core::events::{DomainEvent, EventBus, EventBusError, EventStream};
use chairbook_core::store::BookingStore;
use chairbook_core::types::{Appointment, Contact};
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// In-process event bus on a tokio broadcast channel.
///
/// Publishing with no subscribers succeeds. A subscriber that falls more
/// than `capacity` events behind skips the missed events and logs a
/// warning.
#[derive(Clone, Debug)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventBus {
    /// Bus buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(
        &self,
        event: DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        Box::pin(async move {
            let event_type = event.event_type();
            let receivers = self.sender.send(event).unwrap_or(0);
            tracing::trace!(event_type, receivers, "Event published");
            Ok(())
        })
    }

    fn subscribe(&self) -> Result<EventStream, EventBusError> {
        let receiver = self.sender.subscribe();
        Ok(Box::pin(futures::stream::unfold(
            receiver,
            |mut receiver| async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => return Some((event, receiver)),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Event subscriber lagged, events skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        )))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Notice {
    BookingConfirmation,
    DepositAccepted,
    Cancellation,
}

impl Notice {
    const fn for_event(event: &DomainEvent) -> Option<Self> {
        match event {
            DomainEvent::AppointmentBooked { .. } => Some(Self::BookingConfirmation),
            DomainEvent::AppointmentConfirmed {
                deposit_accepted: true,
                ..
            } => Some(Self::DepositAccepted),
            DomainEvent::AppointmentCancelled { .. } => Some(Self::Cancellation),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::BookingConfirmation => "booking_confirmation",
            Self::DepositAccepted => "deposit_accepted",
            Self::Cancellation => "cancellation",
        }
    }
}

/// Delivers events to the notification sender and calendar sync.
#[derive(Clone)]
pub struct CollaboratorDispatcher {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn NotificationSender>,
    calendar: Arc<dyn CalendarSync>,
    retry: RetryPolicy,
}

impl CollaboratorDispatcher {
    /// Create a dispatcher with the default retry policy
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn NotificationSender>,
        calendar: Arc<dyn CalendarSync>,
    ) -> Self {
        Self {
            store,
            notifier,
            calendar,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Deliver everything `event` calls for. Never fails.
    pub async fn handle(&self, event: &DomainEvent) {
        let Some(appointment) = event.appointment() else {
            return;
        };

        self.sync_calendar(appointment).await;

        if let Some(kind) = Notice::for_event(event) {
            self.notify(kind, appointment).await;
        }
    }

    async fn sync_calendar(&self, appointment: &Appointment) {
        let result = retry_with_backoff(&self.retry, "calendar", || {
            self.calendar.upsert_event(appointment)
        })
        .await;
        JobMetrics::record_delivery("calendar", result.is_ok());
        if let Err(error) = result {
            tracing::error!(
                appointment_id = %appointment.id,
                error = %error,
                "Calendar sync failed"
            );
        }
    }

    async fn contact_for(&self, appointment: &Appointment) -> Option<Contact> {
        match self.store.client(appointment.client_id).await {
            Ok(Some(client)) => Some(client.contact),
            Ok(None) => {
                tracing::warn!(client_id = %appointment.client_id, "No client to notify");
                None
            }
            Err(error) => {
                tracing::warn!(client_id = %appointment.client_id, error = %error, "Client lookup failed");
                None
            }
        }
    }

    async fn notify(&self, kind: Notice, appointment: &Appointment) {
        let Some(contact) = self.contact_for(appointment).await else {
            JobMetrics::record_delivery(kind.as_str(), false);
            return;
        };
        let notice = AppointmentNotice::from(appointment);

        let result = retry_with_backoff(&self.retry, kind.as_str(), || match kind {
            Notice::BookingConfirmation => {
                self.notifier.send_booking_confirmation(&contact, &notice)
            }
            Notice::DepositAccepted => self.notifier.send_deposit_accepted(&contact, &notice),
            Notice::Cancellation => self.notifier.send_cancellation(&contact, &notice),
        })
        .await;

        JobMetrics::record_delivery(kind.as_str(), result.is_ok());
        match result {
            Ok(receipt) => tracing::debug!(
                appointment_id = %appointment.id,
                kind = kind.as_str(),
                message_id = %receipt.message_id,
                "Notification delivered"
            ),
            Err(error) => tracing::error!(
                appointment_id = %appointment.id,
                kind = kind.as_str(),
                error = %error,
                "Notification failed"
            ),
        }
    }

    /// Consume `events` until the stream ends or `shutdown` turns `true`.
    #[must_use]
    pub fn spawn(self, mut events: EventStream, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Collaborator dispatcher started");
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    next = events.next() => {
                        match next {
                            Some(event) => self.handle(&event).await,
                            None => {
                                tracing::warn!("Event stream ended");
                                break;
                            }
                        }
                    }
                }
            }
            tracing::info!("Collaborator dispatcher stopped");
        })
    }
}
