//! Reservation Guard.
//!
//! The only code path that writes an appointment's interval. Both entry
//! points take the per-date lock before looking for overlaps, so two
//! requests for the same date are serialised and at most one of them can
//! see the interval free. The store's exclusive-slot constraint backs this
//! up; a violation of it is reported as a conflict too.

use chairbook_core::error::{BookingError, StoreError};
use chairbook_core::interval::{MinuteInterval, ServiceTrack};
use chairbook_core::store::StoreTransaction;
use chairbook_core::types::{Appointment, AppointmentId};
use chrono::{NaiveDate, NaiveTime};

/// Constraint name fragment identifying a booking-code collision.
pub(crate) const BOOKING_CODE_CONSTRAINT: &str = "booking_code";

/// Whether `err` is a booking-code collision, which the caller handles by
/// generating a new code.
#[must_use]
pub fn is_code_collision(err: &BookingError) -> bool {
    matches!(err, BookingError::Store(StoreError::UniqueViolation(constraint))
        if constraint.contains(BOOKING_CODE_CONSTRAINT))
}

/// Fail with [`BookingError::Conflict`] if anything that blocks `track`
/// overlaps `[start, end)` on `date`.
///
/// The caller must already hold the lock for `date`.
async fn ensure_free(
    tx: &mut dyn StoreTransaction,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    track: &ServiceTrack,
    exclude: Option<AppointmentId>,
) -> Result<(), BookingError> {
    let span = MinuteInterval::from_times(start, end);
    let overlapping = tx.find_overlapping(date, span, exclude).await?;

    if let Some(existing) = overlapping.iter().find(|booked| booked.blocks(track)) {
        tracing::debug!(
            date = %date,
            start = %start,
            end = %end,
            existing = %existing.appointment_id,
            "Interval already taken"
        );
        return Err(BookingError::Conflict { date, start, end });
    }
    Ok(())
}

fn conflict_on_slot_constraint(err: StoreError, appointment: &Appointment) -> BookingError {
    match err {
        StoreError::UniqueViolation(constraint)
            if !constraint.contains(BOOKING_CODE_CONSTRAINT) =>
        {
            BookingError::Conflict {
                date: appointment.date,
                start: appointment.start,
                end: appointment.end,
            }
        }
        other => BookingError::Store(other),
    }
}

/// Reserve `appointment`'s interval and insert it.
///
/// # Errors
///
/// - [`BookingError::Conflict`] if a blocking appointment overlaps
/// - [`BookingError::Store`] with a unique violation on the booking code,
///   see [`is_code_collision`]
/// - [`BookingError::Store`] for any other storage failure
pub async fn try_reserve(
    tx: &mut dyn StoreTransaction,
    appointment: Appointment,
    track: &ServiceTrack,
) -> Result<Appointment, BookingError> {
    tx.lock_day(appointment.date).await?;
    ensure_free(
        tx,
        appointment.date,
        appointment.start,
        appointment.end,
        track,
        None,
    )
    .await?;

    tx.insert_appointment(&appointment)
        .await
        .map_err(|err| conflict_on_slot_constraint(err, &appointment))?;
    Ok(appointment)
}

/// Move an existing appointment to the interval now stored in `moved`.
///
/// `previous_date` is the date it occupied before; both dates are locked
/// in ascending order. The appointment's own current interval never
/// conflicts with the move.
///
/// # Errors
///
/// [`BookingError::Conflict`] if the target interval is taken, otherwise
/// [`BookingError::Store`].
pub async fn try_move(
    tx: &mut dyn StoreTransaction,
    previous_date: NaiveDate,
    moved: &Appointment,
    track: &ServiceTrack,
) -> Result<(), BookingError> {
    let (first, second) = if previous_date <= moved.date {
        (previous_date, moved.date)
    } else {
        (moved.date, previous_date)
    };
    tx.lock_day(first).await?;
    if second != first {
        tx.lock_day(second).await?;
    }

    ensure_free(
        tx,
        moved.date,
        moved.start,
        moved.end,
        track,
        Some(moved.id),
    )
    .await?;

    tx.update_appointment(moved)
        .await
        .map_err(|err| conflict_on_slot_constraint(err, moved))
}
