//! Reminder job.
//!
//! Sends one reminder per upcoming `scheduled`/`confirmed` appointment
//! within the lead time. The reminder flag is set only after a delivery
//! succeeded, so a failed delivery is retried on the next run.

use crate::metrics::JobMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::{EngineEnvironment, abandon};
use chairbook_core::collaborators::{AppointmentNotice, NotificationError, NotificationSender};
use chairbook_core::error::StoreError;
use chairbook_core::lifecycle::{AppointmentAction, AppointmentReducer};
use chairbook_core::reducer::Reducer;
use chairbook_core::types::Appointment;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Outcome of one reminder run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReminderReport {
    /// Appointments due a reminder
    pub due: usize,
    /// Reminders delivered and recorded
    pub sent: usize,
    /// Delivery or bookkeeping failed
    pub failed: usize,
}

#[derive(Error, Debug)]
enum ReminderError {
    #[error("client {0} not found")]
    MissingClient(String),

    #[error(transparent)]
    Delivery(#[from] NotificationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sends reminders ahead of appointments.
#[derive(Clone)]
pub struct ReminderJob {
    env: EngineEnvironment,
    notifier: Arc<dyn NotificationSender>,
    retry: RetryPolicy,
    reducer: AppointmentReducer,
}

impl ReminderJob {
    /// Create the job
    #[must_use]
    pub fn new(env: EngineEnvironment, notifier: Arc<dyn NotificationSender>) -> Self {
        Self {
            env,
            notifier,
            retry: RetryPolicy::default(),
            reducer: AppointmentReducer,
        }
    }

    /// Replace the delivery retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Remind every appointment starting within the lead time.
    ///
    /// # Errors
    ///
    /// Only if the list of due appointments cannot be read.
    pub async fn run_once(&self) -> Result<ReminderReport, StoreError> {
        let now = self.env.local_now();
        let until = now + self.env.settings.reminder_lead();
        let due = self.env.store.reminders_due(now, until).await?;

        let mut report = ReminderReport {
            due: due.len(),
            ..ReminderReport::default()
        };
        for appointment in due {
            match self.remind(&appointment).await {
                Ok(true) => report.sent += 1,
                Ok(false) => {}
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(appointment_id = %appointment.id, error = %error, "Reminder not sent");
                }
            }
        }

        if report.due > 0 {
            tracing::info!(due = report.due, sent = report.sent, failed = report.failed, "Reminder run finished");
        }
        Ok(report)
    }

    async fn remind(&self, appointment: &Appointment) -> Result<bool, ReminderError> {
        let client = self
            .env
            .store
            .client(appointment.client_id)
            .await?
            .ok_or_else(|| ReminderError::MissingClient(appointment.client_id.to_string()))?;

        let notice = AppointmentNotice::from(appointment);
        let delivered = retry_with_backoff(&self.retry, "reminder", || {
            self.notifier.send_reminder(&client.contact, &notice)
        })
        .await;
        JobMetrics::record_delivery("reminder", delivered.is_ok());
        delivered?;

        let mut tx = self.env.store.begin().await?;
        let found = match tx.appointment_for_update(appointment.id).await {
            Ok(found) => found,
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };
        let Some(mut current) = found else {
            abandon(tx).await;
            return Ok(false);
        };

        let events = match self.reducer.reduce(
            &mut current,
            AppointmentAction::MarkReminderSent,
            &self.env.lifecycle(),
        ) {
            Ok(events) if !events.is_empty() => events,
            _ => {
                abandon(tx).await;
                return Ok(false);
            }
        };
        if let Err(err) = tx.update_appointment(&current).await {
            abandon(tx).await;
            return Err(err.into());
        }
        tx.commit().await?;

        self.env.publish_all(events).await;
        Ok(true)
    }

    /// Run every `settings.reminder_interval` until `shutdown` turns `true`
    /// or its sender is dropped.
    #[must_use]
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.env.settings.reminder_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Reminder job started");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(error) = self.run_once().await {
                            tracing::error!(error = %error, "Reminder run failed");
                        }
                    }
                }
            }

            tracing::info!("Reminder job stopped");
        })
    }
}
