//! # Chairbook Core
//!
//! Domain types and pure rules for the Chairbook booking and settlement
//! engine.
//!
//! ## Core Concepts
//!
//! - **Calendar rules**: weekly business hours, breaks and blocked windows
//! - **Slot generation**: candidate start times with an availability flag
//! - **Lifecycle**: the appointment state machine, as a [`Reducer`](reducer::Reducer)
//! - **Events**: facts published after a transaction commits
//! - **Environment**: injected dependencies (clock, store, collaborators)
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Every status change goes through one reducer
//! - Storage, notifications and calendar sync sit behind traits
//!
//! ## Example
//!
//! ```ignore
//! use chairbook_core::lifecycle::{AppointmentAction, AppointmentReducer};
//! use chairbook_core::reducer::Reducer;
//!
//! let events = AppointmentReducer.reduce(
//!     &mut appointment,
//!     AppointmentAction::Confirm,
//!     &env,
//! )?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod calendar;
pub mod collaborators;
pub mod error;
pub mod events;
pub mod interval;
pub mod lifecycle;
pub mod settings;
pub mod settlement;
pub mod slots;
pub mod store;
pub mod types;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Events)`.
/// A rejected action returns an error and leaves the state untouched.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Event`: Facts emitted by accepted actions
    /// - `Error`: Why an action was rejected
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Facts emitted when an action is accepted
        type Event;

        /// Rejection reason
        type Error;

        /// Reduce an action into state changes and events
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is not allowed in the
        /// current state; the state is then unchanged.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 2]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the environment.
pub mod environment {
    use chrono::{DateTime, Utc};

    pub use crate::collaborators::{CalendarSync, NotificationSender};
    pub use crate::events::EventBus;
    pub use crate::store::BookingStore;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(Utc::now());
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
