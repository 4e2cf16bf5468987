//! # Chairbook Testing
//!
//! Testing utilities and helpers for Chairbook.
//!
//! This crate provides:
//! - Deterministic clocks
//! - An in-memory booking store with real transaction semantics
//! - Recording notification, calendar and event bus doubles
//! - A Given-When-Then harness for reducers
//! - Reusable fixtures
//!
//! ## Example
//!
//! ```ignore
//! use chairbook_testing::{InMemoryBookingStore, MemoryState, fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn books_a_slot() {
//!     let store = InMemoryBookingStore::new(
//!         MemoryState::default().with_schedule(fixtures::standard_week()),
//!     );
//!     // build the engine on top of `store` ...
//! }
//! ```

use chairbook_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod collaborators;
pub mod fixtures;
pub mod store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use chairbook_testing::mocks::FixedClock;
    /// use chairbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can hold one handle and give
    /// another to the engine.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to a specific time
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.write() {
                *time = to;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .read()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2030-03-11 08:00:00 UTC, a Monday)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2030-03-11T08:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use collaborators::{
    NotificationKind, RecordingCalendar, RecordingEventBus, RecordingNotifier, SentNotification,
};
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::ReducerTest;
pub use store::{FailPoint, InMemoryBookingStore, MemoryState};
