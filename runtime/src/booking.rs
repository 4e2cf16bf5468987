//! Booking service: slot queries, reservations and status changes.
//!
//! Reads needed for validation happen before a transaction is opened.
//! Every write runs inside one transaction, and events are published only
//! after it commits.

use crate::metrics::BookingMetrics;
use crate::{EngineEnvironment, abandon, guard};
use chairbook_core::calendar::CalendarDay;
use chairbook_core::error::BookingError;
use chairbook_core::events::DomainEvent;
use chairbook_core::interval::{MINUTES_PER_DAY, ServiceTrack, blocking_spans, minute_of_day};
use chairbook_core::lifecycle::{AppointmentAction, AppointmentReducer, NewAppointment, open_appointment};
use chairbook_core::reducer::Reducer;
use chairbook_core::slots::{Slot, generate_slots, mark_past};
use chairbook_core::types::{
    Appointment, AppointmentId, AppointmentStatus, BookingCode, CancellationOrigin, ClientId,
    CreationChannel, Service, ServiceId,
};
use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Attempts at finding an unused booking code before giving up.
const MAX_CODE_ATTEMPTS: usize = 5;

type CodeSource = Arc<dyn Fn() -> BookingCode + Send + Sync>;

/// A request to book one service for one client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Who
    pub client_id: ClientId,
    /// What
    pub service_id: ServiceId,
    /// Day
    pub date: NaiveDate,
    /// Start; must be one of the day's slots
    pub start: NaiveTime,
    /// Free text
    #[serde(default)]
    pub notes: Option<String>,
    /// Paid in full up front
    #[serde(default)]
    pub full_payment: bool,
    /// Where the booking came from
    #[serde(default)]
    pub channel: CreationChannel,
}

/// Booking operations over an [`EngineEnvironment`].
#[derive(Clone)]
pub struct BookingService {
    env: EngineEnvironment,
    reducer: AppointmentReducer,
    codes: CodeSource,
}

impl BookingService {
    /// Service generating random booking codes
    #[must_use]
    pub fn new(env: EngineEnvironment) -> Self {
        Self {
            env,
            reducer: AppointmentReducer,
            codes: Arc::new(|| BookingCode::generate(&mut rand::thread_rng())),
        }
    }

    /// Replace the booking code generator
    #[must_use]
    pub fn with_code_source<F>(mut self, codes: F) -> Self
    where
        F: Fn() -> BookingCode + Send + Sync + 'static,
    {
        self.codes = Arc::new(codes);
        self
    }

    /// The environment this service runs in
    #[must_use]
    pub const fn environment(&self) -> &EngineEnvironment {
        &self.env
    }

    async fn bookable_service(&self, id: ServiceId) -> Result<Service, BookingError> {
        let service = self
            .env
            .store
            .service(id)
            .await?
            .ok_or_else(|| BookingError::not_found("service", id))?;
        if !service.active {
            return Err(BookingError::Validation(format!(
                "service {} is not offered",
                service.name
            )));
        }
        Ok(service)
    }

    async fn calendar_day(&self, date: NaiveDate) -> Result<CalendarDay, BookingError> {
        let schedule = self.env.store.weekly_schedule().await?;
        let blocked = self.env.store.blocked_windows(date).await?;
        Ok(CalendarDay::resolve(&schedule, date, &blocked))
    }

    fn end_of(start: NaiveTime, duration_minutes: u32) -> Result<NaiveTime, BookingError> {
        if minute_of_day(start) + duration_minutes > MINUTES_PER_DAY {
            return Err(BookingError::Validation(format!(
                "a {duration_minutes}-minute service cannot start at {start}"
            )));
        }
        Ok(start + Duration::minutes(i64::from(duration_minutes)))
    }

    fn ensure_whole_minute(time: NaiveTime) -> Result<(), BookingError> {
        if time.second() != 0 || time.nanosecond() != 0 {
            return Err(BookingError::Validation(format!(
                "{time} is not on a whole minute"
            )));
        }
        Ok(())
    }

    fn ensure_future(&self, date: NaiveDate, start: NaiveTime) -> Result<(), BookingError> {
        if date.and_time(start) <= self.env.local_now() {
            return Err(BookingError::Validation(format!(
                "{date} {start} is in the past"
            )));
        }
        Ok(())
    }

    /// Slots for `service_id` on `date`.
    ///
    /// A closed or fully blocked day returns an empty list. Slots that have
    /// already started are returned as unavailable.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown service,
    /// [`BookingError::Validation`] for an inactive one.
    pub async fn available_slots(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, BookingError> {
        let service = self.bookable_service(service_id).await?;
        let day = self.calendar_day(date).await?;
        let booked = self.env.store.booked_intervals(date).await?;

        let track = ServiceTrack::from(&service);
        let spans = blocking_spans(&booked, &track, None);
        let mut slots = generate_slots(
            &day,
            service.duration_minutes,
            &spans,
            self.env.settings.slot_granularity_minutes,
        );
        mark_past(&mut slots, date, self.env.local_now());
        Ok(slots)
    }

    /// Book `request.start` for the client.
    ///
    /// The start must be a slot the day's calendar offers. The initial
    /// status follows the deposit policy: paid in full gives `confirmed`,
    /// a first-time client (when deposits are required) gives `pending`
    /// with a hold, anyone else `scheduled`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown client or service
    /// - [`BookingError::Validation`] if the start is not a bookable slot
    /// - [`BookingError::Conflict`] if the interval was taken meanwhile
    /// - [`BookingError::Store`] on storage failure
    #[tracing::instrument(skip(self, request), fields(service_id = %request.service_id, date = %request.date, start = %request.start))]
    pub async fn book(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        let started = Instant::now();
        let result = self.book_inner(request).await;
        let outcome = match &result {
            Ok(_) => "created",
            Err(BookingError::Conflict { .. }) => "conflict",
            Err(BookingError::Store(_)) => "failed",
            Err(_) => "rejected",
        };
        BookingMetrics::record_attempt(outcome, started.elapsed());
        result
    }

    async fn book_inner(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        let service = self.bookable_service(request.service_id).await?;
        let client = self
            .env
            .store
            .client(request.client_id)
            .await?
            .ok_or_else(|| BookingError::not_found("client", request.client_id))?;

        let end = Self::end_of(request.start, service.duration_minutes)?;
        self.ensure_future(request.date, request.start)?;

        let day = self.calendar_day(request.date).await?;
        day.admits(request.start, end)?;
        let offered = generate_slots(
            &day,
            service.duration_minutes,
            &[],
            self.env.settings.slot_granularity_minutes,
        )
        .into_iter()
        .any(|slot| slot.time == request.start && slot.available);
        if !offered {
            return Err(BookingError::Validation(format!(
                "{} is not a bookable start time on {}",
                request.start, request.date
            )));
        }

        let deposit_required =
            self.env.settings.require_deposit_for_new_clients && client.is_first_time();
        let track = ServiceTrack::from(&service);

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let draft = NewAppointment {
                client_id: client.id,
                service_id: service.id,
                date: request.date,
                start: request.start,
                end,
                channel: request.channel,
                notes: request.notes.clone(),
                full_payment: request.full_payment,
                deposit_required,
                booking_code: (self.codes)(),
            };
            let appointment = open_appointment(
                draft,
                self.env.clock.now(),
                self.env.settings.deposit_hold(),
            );

            let mut tx = self.env.store.begin().await?;
            match guard::try_reserve(tx.as_mut(), appointment, &track).await {
                Ok(appointment) => {
                    tx.commit().await?;
                    tracing::info!(
                        appointment_id = %appointment.id,
                        booking_code = %appointment.booking_code,
                        status = %appointment.status,
                        "Appointment booked"
                    );
                    self.env
                        .publish_all([DomainEvent::AppointmentBooked {
                            appointment: appointment.clone(),
                        }])
                        .await;
                    return Ok(appointment);
                }
                Err(err) if guard::is_code_collision(&err) => {
                    abandon(tx).await;
                    tracing::debug!(attempt, "Booking code collision, regenerating");
                }
                Err(err) => {
                    abandon(tx).await;
                    if matches!(err, BookingError::Conflict { .. }) {
                        BookingMetrics::record_conflict();
                    }
                    return Err(err);
                }
            }
        }

        Err(BookingError::Validation(
            "could not allocate a unique booking code, try again".to_string(),
        ))
    }

    /// Load one appointment.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] if it does not exist.
    pub async fn appointment(&self, id: AppointmentId) -> Result<Appointment, BookingError> {
        self.env
            .store
            .appointment(id)
            .await?
            .ok_or_else(|| BookingError::not_found("appointment", id))
    }

    /// Run `action` against the stored appointment and persist the result.
    ///
    /// An action the reducer accepts without emitting anything writes
    /// nothing.
    async fn apply(
        &self,
        id: AppointmentId,
        action: AppointmentAction,
    ) -> Result<Appointment, BookingError> {
        let mut tx = self.env.store.begin().await?;
        let current = match tx.appointment_for_update(id).await {
            Ok(Some(appointment)) => appointment,
            Ok(None) => {
                abandon(tx).await;
                return Err(BookingError::not_found("appointment", id));
            }
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };

        let mut updated = current;
        let events = match self.reducer.reduce(&mut updated, action, &self.env.lifecycle()) {
            Ok(events) => events,
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };
        if events.is_empty() {
            abandon(tx).await;
            return Ok(updated);
        }

        if let Err(err) = tx.update_appointment(&updated).await {
            abandon(tx).await;
            return Err(err.into());
        }
        tx.commit().await?;

        BookingMetrics::record_transition(updated.status.as_str());
        tracing::info!(
            appointment_id = %updated.id,
            status = %updated.status,
            "Appointment updated"
        );
        self.env.publish_all(events).await;
        Ok(updated)
    }

    /// Move the appointment to `target`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for a target that cannot be requested
    ///   (`pending`, `scheduled`)
    /// - [`BookingError::InvalidTransition`] if the lifecycle forbids it
    /// - [`BookingError::NotFound`] for an unknown appointment
    pub async fn change_status(
        &self,
        id: AppointmentId,
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let action = AppointmentAction::for_target_status(target, reason)?;
        self.apply(id, action).await
    }

    /// Confirm an appointment; for a `pending` one this accepts the deposit.
    ///
    /// # Errors
    ///
    /// As [`change_status`](Self::change_status); a `pending` appointment
    /// whose deposit hold lapsed gives [`BookingError::InvalidTransition`].
    pub async fn confirm(&self, id: AppointmentId) -> Result<Appointment, BookingError> {
        self.apply(id, AppointmentAction::Confirm).await
    }

    /// Cancel on behalf of `origin`.
    ///
    /// # Errors
    ///
    /// As [`change_status`](Self::change_status).
    pub async fn cancel(
        &self,
        id: AppointmentId,
        origin: CancellationOrigin,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        self.apply(id, AppointmentAction::Cancel { origin, reason })
            .await
    }

    /// Move an appointment to `[start, end)` on `date`.
    ///
    /// The interval must span exactly the service duration.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] if the target is not a whole-minute
    ///   interval of the service's length, breaks the calendar rules or
    ///   lies in the past
    /// - [`BookingError::InvalidTransition`] from a status that cannot move
    /// - [`BookingError::Conflict`] if the target interval is taken
    pub async fn reschedule(
        &self,
        id: AppointmentId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        let existing = self.appointment(id).await?;
        let service = self
            .env
            .store
            .service(existing.service_id)
            .await?
            .ok_or_else(|| BookingError::not_found("service", existing.service_id))?;

        Self::ensure_whole_minute(start)?;
        Self::ensure_whole_minute(end)?;
        let expected_end = Self::end_of(start, service.duration_minutes)?;
        if end != expected_end {
            return Err(BookingError::Validation(format!(
                "a {}-minute service starting at {start} ends at {expected_end}, not {end}",
                service.duration_minutes
            )));
        }
        self.ensure_future(date, start)?;
        self.calendar_day(date).await?.admits(start, end)?;

        let mut tx = self.env.store.begin().await?;
        let current = match tx.appointment_for_update(id).await {
            Ok(Some(appointment)) => appointment,
            Ok(None) => {
                abandon(tx).await;
                return Err(BookingError::not_found("appointment", id));
            }
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };

        let previous_date = current.date;
        let mut moved = current;
        let action = AppointmentAction::Reschedule { date, start, end };
        let events = match self.reducer.reduce(&mut moved, action, &self.env.lifecycle()) {
            Ok(events) => events,
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };

        let track = ServiceTrack::from(&service);
        if let Err(err) = guard::try_move(tx.as_mut(), previous_date, &moved, &track).await {
            abandon(tx).await;
            if matches!(err, BookingError::Conflict { .. }) {
                BookingMetrics::record_conflict();
            }
            return Err(err);
        }
        tx.commit().await?;

        tracing::info!(
            appointment_id = %moved.id,
            date = %moved.date,
            start = %moved.start,
            "Appointment rescheduled"
        );
        self.env.publish_all(events).await;
        Ok(moved)
    }
}
