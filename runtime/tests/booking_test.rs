//! Booking service: slots, reservations, status changes and reschedules.

#![allow(clippy::unwrap_used)]

mod common;

use chairbook_core::calendar::BlockedWindow;
use chairbook_core::error::BookingError;
use chairbook_core::events::DomainEvent;
use chairbook_core::types::{AppointmentStatus, BookingCode, CancellationOrigin, ClientId, ServiceId};
use chairbook_testing::MemoryState;
use chairbook_testing::fixtures::{self, monday, sunday, t};
use chrono::{Duration, NaiveDate, NaiveTime};
use common::{Harness, request};
use std::sync::atomic::{AtomicUsize, Ordering};

struct Ids {
    haircut: ServiceId,
    wash: ServiceId,
    regular: ClientId,
    newcomer: ClientId,
}

fn salon() -> (MemoryState, Ids) {
    let haircut = fixtures::haircut();
    let wash = fixtures::hair_wash();
    let regular = fixtures::returning_client();
    let newcomer = fixtures::new_client();
    let ids = Ids {
        haircut: haircut.id,
        wash: wash.id,
        regular: regular.id,
        newcomer: newcomer.id,
    };
    let state = MemoryState::default()
        .with_schedule(fixtures::standard_week())
        .with_service(haircut)
        .with_service(wash)
        .with_client(regular)
        .with_client(newcomer);
    (state, ids)
}

fn available_times(slots: &[chairbook_core::slots::Slot]) -> Vec<NaiveTime> {
    slots
        .iter()
        .filter(|slot| slot.available)
        .map(|slot| slot.time)
        .collect()
}

#[tokio::test]
async fn slots_follow_hours_and_break() {
    let (state, ids) = salon();
    let harness = Harness::new(state);

    let slots = harness
        .booking()
        .available_slots(ids.haircut, monday())
        .await
        .unwrap();

    let times: Vec<NaiveTime> = slots.iter().map(|slot| slot.time).collect();
    assert_eq!(times.first(), Some(&t(9, 0)));
    assert_eq!(times.last(), Some(&t(17, 0)));
    assert!(times.contains(&t(12, 30)));
    assert!(!times.contains(&t(13, 0)));
    assert!(!times.contains(&t(13, 30)));
    assert!(times.contains(&t(14, 0)));
    assert_eq!(times.len(), 15);
    assert!(slots.iter().all(|slot| slot.available));
}

#[tokio::test]
async fn closed_and_blocked_days_have_no_slots() {
    let (state, ids) = salon();
    let tuesday = monday() + Duration::days(1);
    let harness = Harness::new(state.with_blocked(BlockedWindow {
        date: tuesday,
        start: None,
        end: None,
        reason: "Holiday".to_string(),
    }));

    let booking = harness.booking();
    assert!(booking.available_slots(ids.haircut, sunday()).await.unwrap().is_empty());
    assert!(booking.available_slots(ids.haircut, tuesday).await.unwrap().is_empty());
}

#[tokio::test]
async fn booked_interval_blocks_overlapping_slots() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();

    let slots = booking.available_slots(ids.haircut, monday()).await.unwrap();
    let free = available_times(&slots);
    assert!(free.contains(&t(9, 0)));
    assert!(!free.contains(&t(9, 30)));
    assert!(!free.contains(&t(10, 0)));
    assert!(!free.contains(&t(10, 30)));
    assert!(free.contains(&t(11, 0)));
}

#[tokio::test]
async fn slots_already_started_are_unavailable() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    harness.clock.set(fixtures::at(monday(), t(11, 15)));

    let slots = harness
        .booking()
        .available_slots(ids.haircut, monday())
        .await
        .unwrap();

    let free = available_times(&slots);
    assert!(!free.contains(&t(11, 0)));
    assert!(free.contains(&t(11, 30)));
}

#[tokio::test]
async fn initial_status_follows_deposit_policy() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let regular = booking
        .book(request(ids.regular, ids.haircut, monday(), t(9, 0)))
        .await
        .unwrap();
    assert_eq!(regular.status, AppointmentStatus::Scheduled);
    assert_eq!(regular.deposit_hold_expires_at, None);

    let newcomer = booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();
    assert_eq!(newcomer.status, AppointmentStatus::Pending);
    assert!(newcomer.deposit_required);
    assert_eq!(
        newcomer.deposit_hold_expires_at,
        Some(fixtures::at(monday(), t(8, 0)) + Duration::minutes(60))
    );

    let mut paid = request(ids.newcomer, ids.haircut, monday(), t(11, 0));
    paid.full_payment = true;
    let paid = booking.book(paid).await.unwrap();
    assert_eq!(paid.status, AppointmentStatus::Confirmed);
    assert!(paid.deposit_paid);

    assert_eq!(
        harness.events.event_types(),
        vec!["AppointmentBooked"; 3]
    );
}

#[tokio::test]
async fn overlapping_booking_is_a_conflict() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();

    let same = booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(10, 0)))
        .await;
    assert!(matches!(same, Err(BookingError::Conflict { .. })));

    let overlapping = booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(10, 30)))
        .await;
    assert!(matches!(overlapping, Err(BookingError::Conflict { .. })));
    assert_eq!(harness.store.snapshot().await.appointments.len(), 1);
}

#[tokio::test]
async fn concurrent_service_runs_on_its_own_track() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();
    booking
        .book(request(ids.newcomer, ids.wash, monday(), t(10, 0)))
        .await
        .unwrap();

    let second_wash = booking
        .book(request(ids.regular, ids.wash, monday(), t(10, 0)))
        .await;
    assert!(matches!(second_wash, Err(BookingError::Conflict { .. })));
}

#[tokio::test]
async fn starts_outside_the_calendar_are_rejected() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    for (date, start) in [
        (monday(), t(10, 15)),
        (monday(), t(13, 0)),
        (monday(), t(17, 30)),
        (sunday(), t(10, 0)),
        (NaiveDate::from_ymd_opt(2030, 3, 4).unwrap(), t(10, 0)),
    ] {
        let result = booking
            .book(request(ids.regular, ids.haircut, date, start))
            .await;
        assert!(
            matches!(result, Err(BookingError::Validation(_))),
            "{date} {start}: {result:?}"
        );
    }
    assert!(harness.store.snapshot().await.appointments.is_empty());
}

#[tokio::test]
async fn unknown_client_or_service_is_not_found() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let stranger = fixtures::new_client();
    let result = booking
        .book(request(stranger.id, ids.haircut, monday(), t(10, 0)))
        .await;
    assert!(matches!(result, Err(BookingError::NotFound { entity: "client", .. })));

    let result = booking
        .book(request(ids.regular, fixtures::haircut().id, monday(), t(10, 0)))
        .await;
    assert!(matches!(result, Err(BookingError::NotFound { entity: "service", .. })));
}

#[tokio::test]
async fn cancellation_frees_the_slot() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let first = booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();
    let cancelled = booking
        .cancel(first.id, CancellationOrigin::Client, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Cancelled by client"));

    let again = booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(10, 0)))
        .await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn booking_code_collisions_are_regenerated() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let calls = AtomicUsize::new(0);
    let booking = harness.booking().with_code_source(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            BookingCode::from_string("DUPL2345".to_string())
        } else {
            BookingCode::from_string(format!("CODE{n:04}"))
        }
    });

    let first = booking
        .book(request(ids.regular, ids.haircut, monday(), t(9, 0)))
        .await
        .unwrap();
    let second = booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(11, 0)))
        .await
        .unwrap();

    assert_eq!(first.booking_code.as_str(), "DUPL2345");
    assert_eq!(second.booking_code.as_str(), "CODE0002");
}

#[tokio::test]
async fn status_changes_follow_the_lifecycle() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let appointment = booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();

    let started = booking
        .change_status(appointment.id, AppointmentStatus::InProgress, None)
        .await
        .unwrap();
    assert_eq!(started.status, AppointmentStatus::InProgress);

    let completed = booking
        .change_status(appointment.id, AppointmentStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let cancel = booking
        .change_status(appointment.id, AppointmentStatus::Cancelled, Some("late".into()))
        .await;
    assert!(matches!(
        cancel,
        Err(BookingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            ..
        })
    ));

    let back = booking
        .change_status(appointment.id, AppointmentStatus::Scheduled, None)
        .await;
    assert!(matches!(back, Err(BookingError::Validation(_))));

    let stored = booking.appointment(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn confirming_a_pending_booking_accepts_the_deposit() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let pending = booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();
    let confirmed = booking.confirm(pending.id).await.unwrap();

    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    assert!(confirmed.deposit_paid);
    assert_eq!(confirmed.deposit_hold_expires_at, None);
    assert!(harness.events.published().iter().any(|event| matches!(
        event,
        DomainEvent::AppointmentConfirmed {
            deposit_accepted: true,
            ..
        }
    )));
}

#[tokio::test]
async fn reschedule_moves_the_interval() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let appointment = booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();
    booking
        .book(request(ids.newcomer, ids.haircut, monday(), t(15, 0)))
        .await
        .unwrap();

    let shifted = booking
        .reschedule(appointment.id, monday(), t(10, 30), t(11, 30))
        .await
        .unwrap();
    assert_eq!((shifted.start, shifted.end), (t(10, 30), t(11, 30)));

    let taken = booking
        .reschedule(appointment.id, monday(), t(15, 0), t(16, 0))
        .await;
    assert!(matches!(taken, Err(BookingError::Conflict { .. })));

    let next_day = monday() + Duration::days(1);
    let moved = booking
        .reschedule(appointment.id, next_day, t(9, 0), t(10, 0))
        .await
        .unwrap();
    assert_eq!(moved.date, next_day);

    let slots = booking.available_slots(ids.haircut, monday()).await.unwrap();
    assert!(available_times(&slots).contains(&t(10, 30)));
    assert!(harness
        .events
        .event_types()
        .contains(&"AppointmentRescheduled"));
}

#[tokio::test]
async fn reschedule_is_refused_for_closed_appointments() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let appointment = booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();
    booking
        .change_status(appointment.id, AppointmentStatus::NoShow, None)
        .await
        .unwrap();

    let result = booking
        .reschedule(appointment.id, monday(), t(14, 0), t(15, 0))
        .await;
    assert!(matches!(result, Err(BookingError::InvalidTransition { .. })));

    let during_break = booking
        .reschedule(appointment.id, monday(), t(13, 0), t(14, 0))
        .await;
    assert!(matches!(during_break, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn reschedule_keeps_the_service_length() {
    let (state, ids) = salon();
    let harness = Harness::new(state);
    let booking = harness.booking();

    let appointment = booking
        .book(request(ids.regular, ids.haircut, monday(), t(10, 0)))
        .await
        .unwrap();

    let shortened = booking
        .reschedule(appointment.id, monday(), t(14, 0), t(14, 5))
        .await;
    assert!(matches!(shortened, Err(BookingError::Validation(_))));

    let stretched = booking
        .reschedule(appointment.id, monday(), t(14, 0), t(16, 0))
        .await;
    assert!(matches!(stretched, Err(BookingError::Validation(_))));

    let with_seconds = booking
        .reschedule(
            appointment.id,
            monday(),
            NaiveTime::from_hms_opt(14, 0, 37).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 37).unwrap(),
        )
        .await;
    assert!(matches!(with_seconds, Err(BookingError::Validation(_))));

    let stored = booking.appointment(appointment.id).await.unwrap();
    assert_eq!((stored.start, stored.end), (t(10, 0), t(11, 0)));
    assert!(!harness
        .events
        .event_types()
        .contains(&"AppointmentRescheduled"));
}
