//! Slot generation.
//!
//! A greedy linear scan over minute-of-day integers: starting at the
//! opening minute and stepping by the granularity, every start whose
//! service interval still ends by closing time becomes a [`Slot`]. Starts
//! inside the break jump straight to the break's end without emitting
//! anything. A slot is available unless its interval overlaps a booked
//! interval or a partial blocked window (half-open overlap).
//!
//! The "not in the past" filter is a separate pass, [`mark_past`], applied
//! after generation.

use crate::calendar::CalendarDay;
use crate::interval::{MinuteInterval, time_of};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Default slot granularity in minutes
pub const DEFAULT_GRANULARITY_MINUTES: u32 = 30;

/// A candidate start time and whether it can be booked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Local start time
    pub time: NaiveTime,
    /// Bookable right now
    pub available: bool,
}

/// Produce the ordered slot list for one day.
///
/// `booked` must already be filtered to the intervals that block the
/// requested service (see [`blocking_spans`](crate::interval::blocking_spans)).
/// A closed or fully blocked day, a zero duration, or a zero granularity
/// yields an empty list.
#[must_use]
pub fn generate_slots(
    day: &CalendarDay,
    duration_minutes: u32,
    booked: &[MinuteInterval],
    granularity_minutes: u32,
) -> Vec<Slot> {
    if !day.is_bookable() || duration_minutes == 0 || granularity_minutes == 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut current = day.open;

    while current + duration_minutes <= day.close {
        if let Some(window) = day.break_window.filter(|window| window.contains(current)) {
            current = window.end;
            continue;
        }

        let candidate = MinuteInterval::starting_at(current, duration_minutes);
        let available = !booked.iter().any(|span| span.overlaps(&candidate))
            && !day.blackouts.iter().any(|span| span.overlaps(&candidate));

        if let Some(time) = time_of(current) {
            slots.push(Slot { time, available });
        }
        current += granularity_minutes;
    }

    slots
}

/// Mark slots that are not in the future as unavailable.
///
/// Every slot on a date before `now`'s date is unavailable; on `now`'s date,
/// slots starting at or before the current time of day are unavailable.
pub fn mark_past(slots: &mut [Slot], date: NaiveDate, now: NaiveDateTime) {
    let today = now.date();
    if date > today {
        return;
    }
    let cutoff = now.time();
    for slot in slots.iter_mut() {
        if date < today || slot.time <= cutoff {
            slot.available = false;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::calendar::{BlockedWindow, BusinessHours, TimeWindow, WeeklySchedule};
    use crate::interval::minute_of_day;
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn schedule() -> WeeklySchedule {
        WeeklySchedule::new([BusinessHours {
            weekday: 1,
            is_open: true,
            open: t(9, 0),
            close: t(18, 0),
            break_window: Some(TimeWindow { start: t(13, 0), end: t(14, 0) }),
        }])
        .unwrap()
    }

    fn day_with(blocked: &[BlockedWindow]) -> CalendarDay {
        CalendarDay::resolve(&schedule(), monday(), blocked)
    }

    fn partial(start: NaiveTime, end: NaiveTime) -> BlockedWindow {
        BlockedWindow {
            date: monday(),
            start: Some(start),
            end: Some(end),
            reason: "Blocked".to_string(),
        }
    }

    #[test]
    fn hours_with_break_scenario() {
        let slots = generate_slots(&day_with(&[]), 60, &[], 30);
        let times: Vec<NaiveTime> = slots.iter().map(|slot| slot.time).collect();

        let mut expected = Vec::new();
        for minute in (540..=750).step_by(30) {
            expected.push(time_of(minute).unwrap());
        }
        for minute in (840..=1020).step_by(30) {
            expected.push(time_of(minute).unwrap());
        }

        assert_eq!(times, expected);
        assert_eq!(times.first(), Some(&t(9, 0)));
        assert_eq!(times.last(), Some(&t(17, 0)));
        assert!(!times.contains(&t(17, 30)));
        assert!(!times.contains(&t(13, 0)));
        assert!(!times.contains(&t(13, 30)));
        assert!(slots.iter().all(|slot| slot.available));
    }

    #[test]
    fn booked_interval_marks_overlapping_slots() {
        let booked = [MinuteInterval::from_times(t(10, 0), t(11, 0))];
        let slots = generate_slots(&day_with(&[]), 60, &booked, 30);
        let unavailable: Vec<NaiveTime> = slots
            .iter()
            .filter(|slot| !slot.available)
            .map(|slot| slot.time)
            .collect();
        assert_eq!(unavailable, vec![t(9, 30), t(10, 0), t(10, 30)]);
    }

    #[test]
    fn closed_weekday_has_no_slots() {
        let tuesday = monday().succ_opt().unwrap();
        let day = CalendarDay::resolve(&schedule(), tuesday, &[]);
        assert!(generate_slots(&day, 30, &[], 30).is_empty());
    }

    #[test]
    fn degenerate_inputs_yield_nothing() {
        assert!(generate_slots(&day_with(&[]), 0, &[], 30).is_empty());
        assert!(generate_slots(&day_with(&[]), 30, &[], 0).is_empty());
        assert!(generate_slots(&day_with(&[]), 600, &[], 30).is_empty());
    }

    #[test]
    fn past_slots_today_are_unavailable() {
        let mut slots = generate_slots(&day_with(&[]), 60, &[], 30);
        let now = monday().and_time(t(10, 0));
        mark_past(&mut slots, monday(), now);

        for slot in &slots {
            assert_eq!(slot.available, slot.time > t(10, 0), "slot {}", slot.time);
        }
    }

    #[test]
    fn past_and_future_dates() {
        let mut slots = generate_slots(&day_with(&[]), 60, &[], 30);
        let yesterday_view = monday().succ_opt().unwrap().and_time(t(8, 0));
        mark_past(&mut slots, monday(), yesterday_view);
        assert!(slots.iter().all(|slot| !slot.available));

        let mut slots = generate_slots(&day_with(&[]), 60, &[], 30);
        let earlier_view = monday().pred_opt().unwrap().and_time(t(23, 0));
        mark_past(&mut slots, monday(), earlier_view);
        assert!(slots.iter().all(|slot| slot.available));
    }

    proptest! {
        #[test]
        fn full_day_blackout_yields_nothing(duration in 1u32..600) {
            let blocked = [BlockedWindow {
                date: monday(),
                start: None,
                end: None,
                reason: "Closed".to_string(),
            }];
            prop_assert!(generate_slots(&day_with(&blocked), duration, &[], 30).is_empty());
        }

        #[test]
        fn partial_blackout_removes_exactly_overlapping_slots(
            start in 540u32..1000,
            len in 1u32..120,
            duration in prop::sample::select(vec![15u32, 30, 45, 60, 90]),
        ) {
            let end = (start + len).min(1080);
            let window = partial(time_of(start).unwrap(), time_of(end).unwrap());
            let blackout = MinuteInterval::new(start, end);

            let open = generate_slots(&day_with(&[]), duration, &[], 30);
            let blocked = generate_slots(&day_with(&[window]), duration, &[], 30);

            prop_assert_eq!(open.len(), blocked.len());
            for (free, slot) in open.iter().zip(&blocked) {
                prop_assert_eq!(free.time, slot.time);
                let span = MinuteInterval::starting_at(minute_of_day(slot.time), duration);
                prop_assert_eq!(slot.available, !span.overlaps(&blackout));
            }
        }

        #[test]
        fn available_slots_never_overlap_bookings(
            bookings in prop::collection::vec((540u32..1050, 15u32..120), 0..6),
            duration in prop::sample::select(vec![15u32, 30, 45, 60, 90]),
            granularity in prop::sample::select(vec![5u32, 10, 15, 30, 60]),
        ) {
            let booked: Vec<MinuteInterval> = bookings
                .into_iter()
                .map(|(start, len)| MinuteInterval::new(start, (start + len).min(1080)))
                .collect();
            let day = day_with(&[]);

            for slot in generate_slots(&day, duration, &booked, granularity) {
                let span = MinuteInterval::starting_at(minute_of_day(slot.time), duration);
                prop_assert!(span.end <= day.close);
                if slot.available {
                    prop_assert!(booked.iter().all(|b| !b.overlaps(&span)));
                }
            }
        }
    }
}
