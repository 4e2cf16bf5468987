//! Appointment lifecycle transitions, Given-When-Then.

#![allow(clippy::unwrap_used)]

use chairbook_core::environment::Clock;
use chairbook_core::error::LifecycleError;
use chairbook_core::events::DomainEvent;
use chairbook_core::lifecycle::{
    AppointmentAction, AppointmentReducer, HOLD_EXPIRED_REASON, LifecycleEnvironment,
};
use chairbook_core::types::{Appointment, AppointmentStatus, CancellationOrigin};
use chairbook_testing::fixtures::{self, monday, t};
use chairbook_testing::reducer_test::assertions;
use chairbook_testing::{FixedClock, ReducerTest, test_clock};
use chrono::Duration;
use std::sync::Arc;

fn env() -> LifecycleEnvironment {
    LifecycleEnvironment::new(Arc::new(test_clock()))
}

fn env_at(offset: Duration) -> LifecycleEnvironment {
    LifecycleEnvironment::new(Arc::new(FixedClock::new(test_clock().now() + offset)))
}

fn in_status(status: AppointmentStatus) -> Appointment {
    let client = fixtures::returning_client();
    fixtures::appointment(client.id, &fixtures::haircut(), monday(), t(10, 0), status)
}

fn pending_with_hold() -> Appointment {
    let mut appointment = in_status(AppointmentStatus::Pending);
    appointment.deposit_required = true;
    appointment.deposit_hold_expires_at = Some(test_clock().now() + Duration::minutes(60));
    appointment
}

#[test]
fn confirm_accepts_the_deposit() {
    ReducerTest::new(AppointmentReducer)
        .with_env(env())
        .given_state(pending_with_hold())
        .when_action(AppointmentAction::Confirm)
        .then_state(|appointment| {
            assert_eq!(appointment.status, AppointmentStatus::Confirmed);
            assert!(appointment.deposit_paid);
            assert_eq!(appointment.deposit_hold_expires_at, None);
        })
        .then_events(|events| {
            assert!(matches!(
                events,
                [DomainEvent::AppointmentConfirmed {
                    deposit_accepted: true,
                    ..
                }]
            ));
        })
        .run();
}

#[test]
fn confirm_after_the_hold_lapsed_is_refused() {
    ReducerTest::new(AppointmentReducer)
        .with_env(env_at(Duration::minutes(61)))
        .given_state(pending_with_hold())
        .when_action(AppointmentAction::Confirm)
        .then_error(|error| {
            assert!(matches!(
                error,
                LifecycleError::InvalidTransition {
                    from: AppointmentStatus::Pending,
                    ..
                }
            ));
        })
        .run();
}

#[test]
fn expire_hold_requires_a_lapsed_hold() {
    ReducerTest::new(AppointmentReducer)
        .with_env(env_at(Duration::minutes(30)))
        .given_state(pending_with_hold())
        .when_action(AppointmentAction::ExpireHold)
        .then_error(|error| assert!(matches!(error, LifecycleError::Validation(_))))
        .run();

    ReducerTest::new(AppointmentReducer)
        .with_env(env_at(Duration::minutes(61)))
        .given_state(pending_with_hold())
        .when_action(AppointmentAction::ExpireHold)
        .then_state(|appointment| {
            assert_eq!(appointment.status, AppointmentStatus::Cancelled);
            assert_eq!(
                appointment.cancellation_reason.as_deref(),
                Some(HOLD_EXPIRED_REASON)
            );
        })
        .then_events(|events| assertions::assert_events_count(events, 1))
        .run();
}

#[test]
fn cancel_keeps_the_given_reason() {
    ReducerTest::new(AppointmentReducer)
        .with_env(env())
        .given_state(in_status(AppointmentStatus::Confirmed))
        .when_action(AppointmentAction::Cancel {
            origin: CancellationOrigin::Staff,
            reason: Some("  Barber ill  ".to_string()),
        })
        .then_state(|appointment| {
            assert_eq!(appointment.status, AppointmentStatus::Cancelled);
            assert_eq!(appointment.cancellation_reason.as_deref(), Some("Barber ill"));
        })
        .run();
}

#[test]
fn no_show_only_from_scheduled_or_confirmed() {
    ReducerTest::new(AppointmentReducer)
        .with_env(env())
        .given_state(in_status(AppointmentStatus::Scheduled))
        .when_action(AppointmentAction::MarkNoShow)
        .then_state(|appointment| assert_eq!(appointment.status, AppointmentStatus::NoShow))
        .run();

    ReducerTest::new(AppointmentReducer)
        .with_env(env())
        .given_state(in_status(AppointmentStatus::InProgress))
        .when_action(AppointmentAction::MarkNoShow)
        .then_error(|error| {
            assert_eq!(
                *error,
                LifecycleError::InvalidTransition {
                    from: AppointmentStatus::InProgress,
                    action: "mark as no-show",
                }
            );
        })
        .run();
}

#[test]
fn no_show_accepts_nothing_further() {
    for action in [
        AppointmentAction::Start,
        AppointmentAction::Confirm,
        AppointmentAction::Settle,
        AppointmentAction::Reschedule {
            date: monday(),
            start: t(14, 0),
            end: t(15, 0),
        },
    ] {
        ReducerTest::new(AppointmentReducer)
            .with_env(env())
            .given_state(in_status(AppointmentStatus::NoShow))
            .when_action(action)
            .then_error(|error| {
                assert!(matches!(error, LifecycleError::InvalidTransition { .. }));
            })
            .run();
    }
}

#[test]
fn settle_completes_from_any_open_status() {
    for status in [
        AppointmentStatus::Pending,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ] {
        ReducerTest::new(AppointmentReducer)
            .with_env(env())
            .given_state(in_status(status))
            .when_action(AppointmentAction::Settle)
            .then_state(|appointment| {
                assert_eq!(appointment.status, AppointmentStatus::Completed);
            })
            .run();
    }
}

#[test]
fn reschedule_resets_the_reminder() {
    let mut reminded = in_status(AppointmentStatus::Scheduled);
    reminded.reminder_sent = true;

    ReducerTest::new(AppointmentReducer)
        .with_env(env())
        .given_state(reminded)
        .when_action(AppointmentAction::Reschedule {
            date: monday(),
            start: t(15, 0),
            end: t(16, 0),
        })
        .then_state(|appointment| {
            assert_eq!(appointment.start, t(15, 0));
            assert!(!appointment.reminder_sent);
        })
        .then_events(|events| {
            assert!(matches!(
                events,
                [DomainEvent::AppointmentRescheduled { previous, .. }] if previous.start == t(10, 0)
            ));
        })
        .run();
}

#[test]
fn reminder_flag_is_idempotent() {
    let mut reminded = in_status(AppointmentStatus::Confirmed);
    reminded.reminder_sent = true;

    ReducerTest::new(AppointmentReducer)
        .with_env(env())
        .given_state(reminded)
        .when_action(AppointmentAction::MarkReminderSent)
        .then_events(assertions::assert_no_events)
        .run();
}
