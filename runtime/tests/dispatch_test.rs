//! Collaborator dispatch and the reminder job.

#![allow(clippy::unwrap_used)]

mod common;

use chairbook_core::environment::Clock;
use chairbook_core::events::{DomainEvent, EventBus};
use chairbook_core::settings::EngineSettings;
use chairbook_core::types::{Appointment, AppointmentStatus, CancellationOrigin, Client};
use chairbook_runtime::retry::RetryPolicy;
use chairbook_runtime::{
    BookingService, BroadcastEventBus, CollaboratorDispatcher, EngineEnvironment, ReminderJob,
    ReminderReport,
};
use chairbook_testing::collaborators::NotificationKind;
use chairbook_testing::fixtures::{self, monday, t};
use chairbook_testing::{
    InMemoryBookingStore, ManualClock, MemoryState, RecordingCalendar, RecordingNotifier,
    test_clock,
};
use chrono::{Duration, NaiveDate};
use common::{Harness, request};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::watch;

fn quick(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(StdDuration::from_millis(1))
        .max_delay(StdDuration::from_millis(2))
        .build()
}

struct Desk {
    harness: Harness,
    client: Client,
    notifier: RecordingNotifier,
    calendar: RecordingCalendar,
}

impl Desk {
    fn new(notifier: RecordingNotifier, calendar: RecordingCalendar) -> Self {
        Self::with_appointments(notifier, calendar, &[])
    }

    fn with_appointments(
        notifier: RecordingNotifier,
        calendar: RecordingCalendar,
        slots: &[(NaiveDate, chrono::NaiveTime, AppointmentStatus)],
    ) -> Self {
        let haircut = fixtures::haircut();
        let client = fixtures::returning_client();
        let mut state = MemoryState::default()
            .with_schedule(fixtures::standard_week())
            .with_service(haircut.clone())
            .with_client(client.clone());
        for (date, start, status) in slots {
            state = state.with_appointment(fixtures::appointment(
                client.id, &haircut, *date, *start, *status,
            ));
        }
        Self {
            harness: Harness::new(state),
            client,
            notifier,
            calendar,
        }
    }

    fn dispatcher(&self) -> CollaboratorDispatcher {
        CollaboratorDispatcher::new(
            Arc::new(self.harness.store.clone()),
            Arc::new(self.notifier.clone()),
            Arc::new(self.calendar.clone()),
        )
        .with_retry(quick(3))
    }

    fn reminders(&self) -> ReminderJob {
        ReminderJob::new(self.harness.env.clone(), Arc::new(self.notifier.clone()))
            .with_retry(quick(1))
    }

    fn appointment(&self, status: AppointmentStatus) -> Appointment {
        fixtures::appointment(self.client.id, &fixtures::haircut(), monday(), t(10, 0), status)
    }
}

#[tokio::test]
async fn booking_sends_a_confirmation_and_syncs_the_calendar() {
    let desk = Desk::new(RecordingNotifier::new(), RecordingCalendar::new());
    let appointment = desk.appointment(AppointmentStatus::Scheduled);

    desk.dispatcher()
        .handle(&DomainEvent::AppointmentBooked {
            appointment: appointment.clone(),
        })
        .await;

    let sent = desk.notifier.sent_of(NotificationKind::BookingConfirmation);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].contact, desk.client.contact);
    assert_eq!(sent[0].notice.booking_code, appointment.booking_code);
    assert_eq!(desk.calendar.upserts_for(appointment.id).len(), 1);
}

#[tokio::test]
async fn deposit_notice_only_when_a_deposit_was_accepted() {
    let desk = Desk::new(RecordingNotifier::new(), RecordingCalendar::new());
    let dispatcher = desk.dispatcher();
    let appointment = desk.appointment(AppointmentStatus::Confirmed);

    dispatcher
        .handle(&DomainEvent::AppointmentConfirmed {
            appointment: appointment.clone(),
            deposit_accepted: false,
        })
        .await;
    assert!(desk.notifier.sent().is_empty());

    dispatcher
        .handle(&DomainEvent::AppointmentConfirmed {
            appointment: appointment.clone(),
            deposit_accepted: true,
        })
        .await;
    assert_eq!(desk.notifier.sent_of(NotificationKind::DepositAccepted).len(), 1);
    assert_eq!(desk.calendar.upserts_for(appointment.id).len(), 2);
}

#[tokio::test]
async fn cancellation_notice_carries_the_reason() {
    let desk = Desk::new(RecordingNotifier::new(), RecordingCalendar::new());
    let mut appointment = desk.appointment(AppointmentStatus::Cancelled);
    appointment.cancellation_reason = Some("Cancelled by staff".to_string());

    desk.dispatcher()
        .handle(&DomainEvent::AppointmentCancelled {
            appointment,
            origin: CancellationOrigin::Staff,
        })
        .await;

    let sent = desk.notifier.sent_of(NotificationKind::Cancellation);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].notice.reason.as_deref(), Some("Cancelled by staff"));
}

#[tokio::test]
async fn flaky_delivery_is_retried() {
    let desk = Desk::new(RecordingNotifier::failing(2), RecordingCalendar::failing(1));
    let appointment = desk.appointment(AppointmentStatus::Scheduled);

    desk.dispatcher()
        .handle(&DomainEvent::AppointmentBooked {
            appointment: appointment.clone(),
        })
        .await;

    assert_eq!(desk.notifier.attempts(), 3);
    assert_eq!(desk.notifier.sent().len(), 1);
    assert_eq!(desk.calendar.upserts_for(appointment.id).len(), 1);
}

#[tokio::test]
async fn delivery_failure_is_absorbed() {
    let desk = Desk::new(RecordingNotifier::failing(10), RecordingCalendar::failing(10));
    let appointment = desk.appointment(AppointmentStatus::Scheduled);

    desk.dispatcher()
        .handle(&DomainEvent::AppointmentBooked { appointment })
        .await;

    assert_eq!(desk.notifier.attempts(), 4);
    assert!(desk.notifier.sent().is_empty());
    assert!(desk.calendar.upserts().is_empty());
}

#[tokio::test]
async fn reminder_events_are_not_dispatched() {
    let desk = Desk::new(RecordingNotifier::new(), RecordingCalendar::new());
    desk.dispatcher()
        .handle(&DomainEvent::ReminderSent {
            appointment_id: desk.appointment(AppointmentStatus::Confirmed).id,
        })
        .await;
    assert_eq!(desk.notifier.attempts(), 0);
    assert!(desk.calendar.upserts().is_empty());
}

#[tokio::test]
async fn committed_bookings_reach_collaborators_through_the_bus() {
    let haircut = fixtures::haircut();
    let client = fixtures::returning_client();
    let store = InMemoryBookingStore::new(
        MemoryState::default()
            .with_schedule(fixtures::standard_week())
            .with_service(haircut.clone())
            .with_client(client.clone()),
    );
    let bus = BroadcastEventBus::default();
    let notifier = RecordingNotifier::new();
    let calendar = RecordingCalendar::new();
    let env = EngineEnvironment::new(
        Arc::new(store.clone()),
        Arc::new(ManualClock::new(test_clock().now())),
        Arc::new(bus.clone()),
        EngineSettings::default(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = CollaboratorDispatcher::new(
        Arc::new(store),
        Arc::new(notifier.clone()),
        Arc::new(calendar.clone()),
    )
    .with_retry(quick(0))
    .spawn(bus.subscribe().unwrap(), shutdown_rx);

    let booked = BookingService::new(env)
        .book(request(client.id, haircut.id, monday(), t(10, 0)))
        .await
        .unwrap();

    let delivered = tokio::time::timeout(StdDuration::from_secs(5), async {
        while calendar.upserts_for(booked.id).is_empty()
            || notifier.sent_of(NotificationKind::BookingConfirmation).is_empty()
        {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    })
    .await;
    assert!(delivered.is_ok());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(StdDuration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn reminders_go_out_once_within_the_lead_time() {
    let tuesday = monday().succ_opt().unwrap();
    let desk = Desk::with_appointments(
        RecordingNotifier::new(),
        RecordingCalendar::new(),
        &[
            (monday(), t(10, 0), AppointmentStatus::Confirmed),
            (monday(), t(14, 0), AppointmentStatus::Scheduled),
            (monday(), t(15, 0), AppointmentStatus::Cancelled),
            // 25 hours ahead of the clock
            (tuesday, t(9, 0), AppointmentStatus::Scheduled),
        ],
    );
    let job = desk.reminders();

    let report = job.run_once().await.unwrap();
    assert_eq!(
        report,
        ReminderReport {
            due: 2,
            sent: 2,
            failed: 0,
        }
    );
    assert_eq!(desk.notifier.sent_of(NotificationKind::Reminder).len(), 2);
    let flagged = desk
        .harness
        .store
        .snapshot()
        .await
        .appointments
        .values()
        .filter(|a| a.reminder_sent)
        .count();
    assert_eq!(flagged, 2);
    assert_eq!(
        desk.harness.events.event_types(),
        vec!["ReminderSent", "ReminderSent"]
    );

    let again = job.run_once().await.unwrap();
    assert_eq!(again, ReminderReport::default());

    desk.harness.clock.advance(Duration::hours(2));
    let next_day = job.run_once().await.unwrap();
    assert_eq!(next_day.sent, 1);
}

#[tokio::test]
async fn failed_reminder_is_retried_on_the_next_run() {
    let desk = Desk::with_appointments(
        RecordingNotifier::failing(2),
        RecordingCalendar::new(),
        &[(monday(), t(10, 0), AppointmentStatus::Confirmed)],
    );
    let job = desk.reminders();

    let first = job.run_once().await.unwrap();
    assert_eq!(first.failed, 1);
    assert!(
        desk.harness
            .store
            .snapshot()
            .await
            .appointments
            .values()
            .all(|a| !a.reminder_sent)
    );

    let second = job.run_once().await.unwrap();
    assert_eq!(second.sent, 1);
    assert_eq!(desk.notifier.sent_of(NotificationKind::Reminder).len(), 1);
}
