//! Half-open minute-of-day intervals and the occupancy rule.
//!
//! Every time range the engine compares (opening hours, breaks, blackout
//! windows, booked appointments) is normalised to `[start, end)` minutes
//! after midnight before any overlap test.

use crate::types::{AppointmentId, Service, ServiceId};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Minutes in a day
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Minutes after midnight for a local time (seconds are truncated).
#[must_use]
pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Local time for a minute-of-day, `None` past 23:59.
#[must_use]
pub fn time_of(minute: u32) -> Option<NaiveTime> {
    if minute >= MINUTES_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
}

/// Half-open interval `[start, end)` in minutes after midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MinuteInterval {
    /// Inclusive start
    pub start: u32,
    /// Exclusive end
    pub end: u32,
}

impl MinuteInterval {
    /// Interval from raw minutes. `end` may equal `start` (empty interval).
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Interval from local times
    #[must_use]
    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(minute_of_day(start), minute_of_day(end))
    }

    /// Interval of `duration` minutes beginning at `start`
    #[must_use]
    pub const fn starting_at(start: u32, duration: u32) -> Self {
        Self::new(start, start.saturating_add(duration))
    }

    /// Length in minutes
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// True when the interval contains no minute
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Half-open overlap: `a.start < b.end && a.end > b.start`
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Whether `minute` falls inside the interval
    #[must_use]
    pub const fn contains(&self, minute: u32) -> bool {
        self.start <= minute && minute < self.end
    }
}

/// An existing appointment's hold on the calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    /// Holding appointment
    pub appointment_id: AppointmentId,
    /// Its service
    pub service_id: ServiceId,
    /// Its service may run in parallel
    pub allows_concurrent: bool,
    /// Occupied minutes
    pub span: MinuteInterval,
}

/// The service a candidate interval is being checked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceTrack {
    /// Candidate service
    pub service_id: ServiceId,
    /// Candidate service may run in parallel
    pub allows_concurrent: bool,
}

impl From<&Service> for ServiceTrack {
    fn from(service: &Service) -> Self {
        Self {
            service_id: service.id,
            allows_concurrent: service.allows_concurrent,
        }
    }
}

impl BookedInterval {
    /// Whether this booking prevents `track` from using an overlapping interval.
    ///
    /// Standard services block each other. A concurrent-allowed service runs
    /// on a parallel track: it never blocks or is blocked by a standard
    /// service or by a different concurrent-allowed service, but holds a
    /// capacity of one for its own service.
    #[must_use]
    pub fn blocks(&self, track: &ServiceTrack) -> bool {
        match (self.allows_concurrent, track.allows_concurrent) {
            (false, false) => true,
            (true, true) => self.service_id == track.service_id,
            _ => false,
        }
    }
}

/// Spans from `booked` that block `track`, ignoring `exclude`.
#[must_use]
pub fn blocking_spans(
    booked: &[BookedInterval],
    track: &ServiceTrack,
    exclude: Option<AppointmentId>,
) -> Vec<MinuteInterval> {
    booked
        .iter()
        .filter(|b| Some(b.appointment_id) != exclude && b.blocks(track))
        .map(|b| b.span)
        .collect()
}
