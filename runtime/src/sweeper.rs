//! Deposit Expiry Sweeper.
//!
//! Periodically cancels `pending` appointments whose deposit hold has
//! lapsed, freeing their intervals. Each appointment is handled in its own
//! transaction and re-checked under lock, so an appointment confirmed
//! between the query and the write is left alone, and one failure never
//! stops the rest of the batch.

use crate::metrics::JobMetrics;
use crate::{EngineEnvironment, abandon};
use chairbook_core::error::{BookingError, StoreError};
use chairbook_core::lifecycle::{AppointmentAction, AppointmentReducer};
use chairbook_core::reducer::Reducer;
use chairbook_core::types::AppointmentId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Appointments the query returned
    pub examined: usize,
    /// Cancelled by this sweep
    pub cancelled: usize,
    /// No longer eligible once locked (confirmed or already gone)
    pub skipped: usize,
    /// Failed; retried on the next sweep
    pub failed: usize,
}

enum Outcome {
    Cancelled,
    Skipped,
}

/// Cancels lapsed deposit holds.
#[derive(Clone)]
pub struct DepositExpirySweeper {
    env: EngineEnvironment,
    reducer: AppointmentReducer,
}

impl DepositExpirySweeper {
    /// Create a sweeper
    #[must_use]
    pub const fn new(env: EngineEnvironment) -> Self {
        Self {
            env,
            reducer: AppointmentReducer,
        }
    }

    /// Run one sweep at the environment clock's current time.
    ///
    /// # Errors
    ///
    /// Only if the list of expired holds cannot be read. Failures on
    /// individual appointments are counted in the report.
    pub async fn run_once(&self) -> Result<SweepReport, StoreError> {
        let now = self.env.clock.now();
        let expired = self.env.store.expired_holds(now).await?;
        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for id in expired {
            match self.expire(id).await {
                Ok(Outcome::Cancelled) => {
                    report.cancelled += 1;
                    JobMetrics::record_expired();
                }
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(error) => {
                    report.failed += 1;
                    JobMetrics::record_sweep_failure();
                    tracing::error!(appointment_id = %id, error = %error, "Failed to expire deposit hold");
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                cancelled = report.cancelled,
                skipped = report.skipped,
                failed = report.failed,
                "Deposit sweep finished"
            );
        }
        Ok(report)
    }

    async fn expire(&self, id: AppointmentId) -> Result<Outcome, BookingError> {
        let mut tx = self.env.store.begin().await?;
        let found = match tx.appointment_for_update(id).await {
            Ok(found) => found,
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };
        let Some(mut appointment) = found else {
            abandon(tx).await;
            return Ok(Outcome::Skipped);
        };

        let Ok(events) =
            self.reducer
                .reduce(&mut appointment, AppointmentAction::ExpireHold, &self.env.lifecycle())
        else {
            abandon(tx).await;
            tracing::debug!(appointment_id = %id, "Hold no longer lapsed, skipping");
            return Ok(Outcome::Skipped);
        };

        if let Err(err) = tx.update_appointment(&appointment).await {
            abandon(tx).await;
            return Err(err.into());
        }
        tx.commit().await?;

        tracing::info!(
            appointment_id = %id,
            booking_code = %appointment.booking_code,
            "Pending appointment cancelled, deposit hold expired"
        );
        self.env.publish_all(events).await;
        Ok(Outcome::Cancelled)
    }

    /// Sweep every `settings.sweep_interval` until `shutdown` turns `true`
    /// or its sender is dropped.
    #[must_use]
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.env.settings.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = self.env.settings.sweep_interval.as_secs(),
                "Deposit expiry sweeper started"
            );

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(error) = self.run_once().await {
                            JobMetrics::record_sweep_failure();
                            tracing::error!(error = %error, "Deposit sweep failed");
                        }
                    }
                }
            }

            tracing::info!("Deposit expiry sweeper stopped");
        })
    }
}
