//! Engine settings.

use crate::slots::DEFAULT_GRANULARITY_MINUTES;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

/// Tunables shared by every engine component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Step between candidate slot starts, in minutes
    pub slot_granularity_minutes: u32,
    /// How long an unpaid deposit hold lasts, in minutes
    pub deposit_hold_minutes: u32,
    /// First-time clients must leave a deposit
    pub require_deposit_for_new_clients: bool,
    /// Offset of business local time from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Deposit expiry sweep period
    pub sweep_interval: StdDuration,
    /// Remind clients this many hours ahead
    pub reminder_lead_hours: u32,
    /// Reminder job period
    pub reminder_interval: StdDuration,
    /// Upper bound on product lines per settlement
    pub max_product_lines: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
            deposit_hold_minutes: 60,
            require_deposit_for_new_clients: true,
            utc_offset_minutes: 0,
            sweep_interval: StdDuration::from_secs(300),
            reminder_lead_hours: 24,
            reminder_interval: StdDuration::from_secs(900),
            max_product_lines: 20,
        }
    }
}

impl EngineSettings {
    /// Deposit hold window
    #[must_use]
    pub fn deposit_hold(&self) -> Duration {
        Duration::minutes(i64::from(self.deposit_hold_minutes))
    }

    /// Reminder lead time
    #[must_use]
    pub fn reminder_lead(&self) -> Duration {
        Duration::hours(i64::from(self.reminder_lead_hours))
    }

    /// Business timezone; out-of-range offsets fall back to UTC
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Business local date-time for a UTC instant
    #[must_use]
    pub fn local_now(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset()).naive_local()
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.slot_granularity_minutes == 0 {
            return Err("slot granularity must be positive".to_string());
        }
        if self.deposit_hold_minutes == 0 {
            return Err("deposit hold must be positive".to_string());
        }
        if self.sweep_interval.is_zero() || self.reminder_interval.is_zero() {
            return Err("job intervals must be positive".to_string());
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(format!("UTC offset {} minutes is out of range", self.utc_offset_minutes));
        }
        Ok(())
    }
}
