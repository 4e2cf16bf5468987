//! Calendar rules: weekly business hours, breaks and blocked windows.
//!
//! Pure functions only. A [`CalendarDay`] is derived for a specific date by
//! layering that date's [`BlockedWindow`]s over the weekday's
//! [`BusinessHours`]; nothing here is stored.

use crate::interval::{MinuteInterval, minute_of_day};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid calendar configuration or an interval the calendar does not admit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Weekday outside 0 (Sunday) ..= 6 (Saturday)
    #[error("weekday {0} is out of range (0 = Sunday .. 6 = Saturday)")]
    InvalidWeekday(u8),

    /// Same weekday configured twice
    #[error("weekday {0} is configured more than once")]
    DuplicateWeekday(u8),

    /// Opening time not before closing time
    #[error("weekday {weekday}: open {open} must be before close {close}")]
    InvalidHours {
        /// Offending weekday
        weekday: u8,
        /// Opening time
        open: NaiveTime,
        /// Closing time
        close: NaiveTime,
    },

    /// Break window empty or outside opening hours
    #[error("weekday {weekday}: break {start}-{end} must be non-empty and within opening hours")]
    InvalidBreak {
        /// Offending weekday
        weekday: u8,
        /// Break start
        start: NaiveTime,
        /// Break end
        end: NaiveTime,
    },

    /// Partial blocked window with start not before end
    #[error("blocked window on {date}: start must be before end")]
    InvalidBlockedWindow {
        /// Date of the window
        date: NaiveDate,
    },

    /// The day is closed or fully blocked
    #[error("{0} is not open for bookings")]
    Closed(NaiveDate),

    /// Interval outside opening hours
    #[error("{start}-{end} is outside opening hours")]
    OutsideHours {
        /// Requested start
        start: NaiveTime,
        /// Requested end
        end: NaiveTime,
    },

    /// Interval starts during the break
    #[error("{0} falls within the break")]
    DuringBreak(NaiveTime),

    /// Interval overlaps a blocked window
    #[error("{start}-{end} overlaps a blocked window")]
    Blocked {
        /// Requested start
        start: NaiveTime,
        /// Requested end
        end: NaiveTime,
    },
}

/// Break or other daily window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: NaiveTime,
    /// Exclusive end
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Minute interval of the window
    #[must_use]
    pub fn span(&self) -> MinuteInterval {
        MinuteInterval::from_times(self.start, self.end)
    }
}

/// Opening hours for one weekday.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u8,
    /// Open at all on this weekday
    pub is_open: bool,
    /// Opening time
    pub open: NaiveTime,
    /// Closing time
    pub close: NaiveTime,
    /// Optional midday break
    pub break_window: Option<TimeWindow>,
}

impl BusinessHours {
    /// A closed weekday
    #[must_use]
    pub const fn closed(weekday: u8) -> Self {
        Self {
            weekday,
            is_open: false,
            open: NaiveTime::MIN,
            close: NaiveTime::MIN,
            break_window: None,
        }
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError`] when the weekday is out of range, opening
    /// hours are inverted, or the break is empty or outside opening hours.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.weekday > 6 {
            return Err(CalendarError::InvalidWeekday(self.weekday));
        }
        if !self.is_open {
            return Ok(());
        }
        if self.open >= self.close {
            return Err(CalendarError::InvalidHours {
                weekday: self.weekday,
                open: self.open,
                close: self.close,
            });
        }
        if let Some(window) = self.break_window {
            if window.start >= window.end || window.start < self.open || window.end > self.close {
                return Err(CalendarError::InvalidBreak {
                    weekday: self.weekday,
                    start: window.start,
                    end: window.end,
                });
            }
        }
        Ok(())
    }
}

/// Business hours for the whole week.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    days: [BusinessHours; 7],
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            days: [0, 1, 2, 3, 4, 5, 6].map(BusinessHours::closed),
        }
    }
}

impl WeeklySchedule {
    /// Build a schedule; weekdays not listed are closed.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError`] if any row is invalid or a weekday repeats.
    pub fn new(rows: impl IntoIterator<Item = BusinessHours>) -> Result<Self, CalendarError> {
        let mut schedule = Self::default();
        let mut seen = [false; 7];
        for hours in rows {
            hours.validate()?;
            let index = usize::from(hours.weekday);
            if seen[index] {
                return Err(CalendarError::DuplicateWeekday(hours.weekday));
            }
            seen[index] = true;
            schedule.days[index] = hours;
        }
        Ok(schedule)
    }

    /// Hours for a weekday (0 = Sunday)
    #[must_use]
    pub fn for_weekday(&self, weekday: u8) -> Option<&BusinessHours> {
        self.days.get(usize::from(weekday))
    }

    /// Hours for a calendar date
    #[must_use]
    pub fn for_date(&self, date: NaiveDate) -> &BusinessHours {
        let index = date.weekday().num_days_from_sunday() as usize;
        &self.days[index % 7]
    }

    /// All seven rows, Sunday first
    #[must_use]
    pub const fn days(&self) -> &[BusinessHours; 7] {
        &self.days
    }
}

/// Operator-declared unavailability on a date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedWindow {
    /// Blocked date
    pub date: NaiveDate,
    /// Start time; `None` together with `end` blocks the whole day
    pub start: Option<NaiveTime>,
    /// End time
    pub end: Option<NaiveTime>,
    /// Why
    pub reason: String,
}

impl BlockedWindow {
    /// Whole-day window: no time range, or only one bound set
    #[must_use]
    pub const fn is_full_day(&self) -> bool {
        !matches!((self.start, self.end), (Some(_), Some(_)))
    }

    /// Minute span of a partial window
    #[must_use]
    pub fn span(&self) -> Option<MinuteInterval> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(MinuteInterval::from_times(start, end)),
            _ => None,
        }
    }

    /// Check a partial window's bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidBlockedWindow`] when `start >= end`.
    pub fn validate(&self) -> Result<(), CalendarError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start >= end => {
                Err(CalendarError::InvalidBlockedWindow { date: self.date })
            }
            _ => Ok(()),
        }
    }
}

/// The rules in force on one date, normalised to minutes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarDay {
    /// The date
    pub date: NaiveDate,
    /// Weekday is open
    pub is_open: bool,
    /// A whole-day blocked window applies
    pub fully_blocked: bool,
    /// Opening minute
    pub open: u32,
    /// Closing minute
    pub close: u32,
    /// Break, if any
    pub break_window: Option<MinuteInterval>,
    /// Partial blocked windows
    pub blackouts: Vec<MinuteInterval>,
}

impl CalendarDay {
    /// Derive the rules for `date`. Windows for other dates are ignored.
    #[must_use]
    pub fn resolve(schedule: &WeeklySchedule, date: NaiveDate, blocked: &[BlockedWindow]) -> Self {
        let hours = schedule.for_date(date);
        let on_date = blocked.iter().filter(|window| window.date == date);

        let mut fully_blocked = false;
        let mut blackouts = Vec::new();
        for window in on_date {
            match window.span() {
                Some(span) if !span.is_empty() => blackouts.push(span),
                Some(_) => {}
                None => fully_blocked = true,
            }
        }
        blackouts.sort_unstable();

        Self {
            date,
            is_open: hours.is_open,
            fully_blocked,
            open: minute_of_day(hours.open),
            close: minute_of_day(hours.close),
            break_window: hours.break_window.map(|window| window.span()),
            blackouts,
        }
    }

    /// Whether anything can be booked on this day
    #[must_use]
    pub const fn is_bookable(&self) -> bool {
        self.is_open && !self.fully_blocked
    }

    /// Check that `[start, end)` fits the day's rules, ignoring other bookings.
    ///
    /// # Errors
    ///
    /// Returns the first rule the interval violates.
    pub fn admits(&self, start: NaiveTime, end: NaiveTime) -> Result<(), CalendarError> {
        if !self.is_bookable() {
            return Err(CalendarError::Closed(self.date));
        }
        let span = MinuteInterval::from_times(start, end);
        if span.is_empty() || span.start < self.open || span.end > self.close {
            return Err(CalendarError::OutsideHours { start, end });
        }
        if self
            .break_window
            .is_some_and(|window| window.contains(span.start))
        {
            return Err(CalendarError::DuringBreak(start));
        }
        if self.blackouts.iter().any(|blackout| blackout.overlaps(&span)) {
            return Err(CalendarError::Blocked { start, end });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn weekday_hours(weekday: u8) -> BusinessHours {
        BusinessHours {
            weekday,
            is_open: true,
            open: t(9, 0),
            close: t(18, 0),
            break_window: Some(TimeWindow { start: t(13, 0), end: t(14, 0) }),
        }
    }

    // 2025-03-10 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn schedule_rejects_invalid_rows() {
        let inverted = BusinessHours { open: t(18, 0), close: t(9, 0), ..weekday_hours(1) };
        assert!(matches!(
            WeeklySchedule::new([inverted]),
            Err(CalendarError::InvalidHours { weekday: 1, .. })
        ));

        let stray_break = BusinessHours {
            break_window: Some(TimeWindow { start: t(8, 0), end: t(9, 30) }),
            ..weekday_hours(2)
        };
        assert!(matches!(
            WeeklySchedule::new([stray_break]),
            Err(CalendarError::InvalidBreak { .. })
        ));

        assert_eq!(
            WeeklySchedule::new([weekday_hours(3), weekday_hours(3)]),
            Err(CalendarError::DuplicateWeekday(3))
        );
        assert_eq!(
            WeeklySchedule::new([weekday_hours(7)]),
            Err(CalendarError::InvalidWeekday(7))
        );
    }

    #[test]
    fn unlisted_weekdays_are_closed() {
        let schedule = WeeklySchedule::new([weekday_hours(1)]).unwrap();
        assert!(schedule.for_date(monday()).is_open);
        assert!(!schedule.for_date(monday().succ_opt().unwrap()).is_open);
    }

    #[test]
    fn resolve_layers_blocked_windows() {
        let schedule = WeeklySchedule::new([weekday_hours(1)]).unwrap();
        let blocked = vec![
            BlockedWindow {
                date: monday(),
                start: Some(t(10, 0)),
                end: Some(t(11, 0)),
                reason: "Supplier visit".to_string(),
            },
            BlockedWindow {
                date: monday().succ_opt().unwrap(),
                start: None,
                end: None,
                reason: "Holiday".to_string(),
            },
        ];

        let day = CalendarDay::resolve(&schedule, monday(), &blocked);
        assert!(day.is_bookable());
        assert_eq!(day.open, 540);
        assert_eq!(day.close, 1080);
        assert_eq!(day.break_window, Some(MinuteInterval::new(780, 840)));
        assert_eq!(day.blackouts, vec![MinuteInterval::new(600, 660)]);
    }

    #[test]
    fn full_day_window_closes_the_day() {
        let schedule = WeeklySchedule::new([weekday_hours(1)]).unwrap();
        let blocked = vec![BlockedWindow {
            date: monday(),
            start: None,
            end: None,
            reason: "Closed for renovation".to_string(),
        }];
        let day = CalendarDay::resolve(&schedule, monday(), &blocked);
        assert!(!day.is_bookable());
        assert_eq!(day.admits(t(9, 0), t(10, 0)), Err(CalendarError::Closed(monday())));
    }

    #[test]
    fn admits_checks_hours_break_and_blackouts() {
        let schedule = WeeklySchedule::new([weekday_hours(1)]).unwrap();
        let blocked = vec![BlockedWindow {
            date: monday(),
            start: Some(t(16, 0)),
            end: Some(t(17, 0)),
            reason: "Training".to_string(),
        }];
        let day = CalendarDay::resolve(&schedule, monday(), &blocked);

        assert!(day.admits(t(9, 0), t(10, 0)).is_ok());
        assert!(day.admits(t(14, 0), t(15, 0)).is_ok());
        assert!(matches!(day.admits(t(8, 30), t(9, 30)), Err(CalendarError::OutsideHours { .. })));
        assert!(matches!(day.admits(t(17, 30), t(18, 30)), Err(CalendarError::OutsideHours { .. })));
        assert_eq!(day.admits(t(13, 30), t(14, 30)), Err(CalendarError::DuringBreak(t(13, 30))));
        assert!(matches!(day.admits(t(15, 30), t(16, 30)), Err(CalendarError::Blocked { .. })));
    }

    #[test]
    fn blocked_window_validation() {
        let window = BlockedWindow {
            date: monday(),
            start: Some(t(12, 0)),
            end: Some(t(11, 0)),
            reason: String::new(),
        };
        assert!(window.validate().is_err());
        assert!(!window.is_full_day());
    }
}
