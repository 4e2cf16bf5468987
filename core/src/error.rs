//! Error taxonomy.
//!
//! One `thiserror` enum per boundary. Every caller-facing error exposes a
//! stable machine [`code`](BookingError::code) so transports can map it
//! without matching on message text.

use crate::calendar::CalendarError;
use crate::types::{AppointmentId, AppointmentStatus, ClientId, GrantStatus, ProductId};
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Persistence failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection or pool failure
    #[error("Storage connection failed: {0}")]
    Connection(String),

    /// Query failed
    #[error("Storage query failed: {0}")]
    Query(String),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Stored data could not be decoded
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// The transaction was already finished or poisoned
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl StoreError {
    /// Transient failures worth retrying
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// An action the lifecycle does not allow from the current status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The status does not allow the action
    #[error("cannot {action} an appointment that is {from}")]
    InvalidTransition {
        /// Current status
        from: AppointmentStatus,
        /// Attempted action
        action: &'static str,
    },

    /// The action is malformed
    #[error("{0}")]
    Validation(String),
}

/// Errors from booking, status changes and rescheduling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed input, rejected before any state change
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The interval is no longer free; re-fetch slots and retry
    #[error("Slot {start}-{end} on {date} is no longer available")]
    Conflict {
        /// Requested date
        date: NaiveDate,
        /// Requested start
        start: NaiveTime,
        /// Requested end
        end: NaiveTime,
    },

    /// Lifecycle rule violation
    #[error("Invalid transition: cannot {action} an appointment that is {from}")]
    InvalidTransition {
        /// Current status
        from: AppointmentStatus,
        /// Attempted action
        action: &'static str,
    },

    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Identifier as text
        id: String,
    },

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Shorthand for [`BookingError::NotFound`]
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict { .. } => "SLOT_UNAVAILABLE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Whether the caller may retry (after re-reading state)
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<LifecycleError> for BookingError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidTransition { from, action } => {
                Self::InvalidTransition { from, action }
            }
            LifecycleError::Validation(message) => Self::Validation(message),
        }
    }
}

impl From<CalendarError> for BookingError {
    fn from(err: CalendarError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Errors from the settlement transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Malformed request, rejected before any write
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Appointment or product missing
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Identifier as text
        id: String,
    },

    /// A settlement record already exists for the appointment
    #[error("Appointment {0} is already settled")]
    AlreadySettled(AppointmentId),

    /// The appointment's status does not allow settlement
    #[error("Appointment cannot be settled while {status}")]
    InvalidState {
        /// Current status
        status: AppointmentStatus,
    },

    /// No active, eligible grant with a remaining credit
    #[error("Client {0} has no eligible membership credit for this service")]
    NoEligibleCredit(ClientId),

    /// Not enough units on hand
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Product
        product_id: ProductId,
        /// Units requested
        requested: u32,
        /// Units on hand
        available: u32,
    },

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// Shorthand for [`SettlementError::NotFound`]
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadySettled(_) => "ALREADY_SETTLED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::NoEligibleCredit(_) => "NO_ELIGIBLE_CREDIT",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Only transient storage failures are retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Errors from membership administration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Malformed request
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Grant, client or plan missing
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Identifier as text
        id: String,
    },

    /// Grant status does not allow the change
    #[error("Grant is {from} and cannot be {action}")]
    InvalidTransition {
        /// Current status
        from: GrantStatus,
        /// Attempted action
        action: &'static str,
    },

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MembershipError {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Store(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_booking_errors() {
        let err: BookingError = LifecycleError::InvalidTransition {
            from: AppointmentStatus::Completed,
            action: "cancel",
        }
        .into();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot cancel an appointment that is completed"
        );
    }

    #[test]
    fn conflicts_are_retryable() {
        let err = BookingError::Conflict {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap_or_default(),
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        };
        assert!(err.is_retryable());
        assert_eq!(err.code(), "SLOT_UNAVAILABLE");
    }

    #[test]
    fn settlement_codes_are_distinct() {
        let codes = [
            SettlementError::Validation(String::new()).code(),
            SettlementError::AlreadySettled(AppointmentId::new()).code(),
            SettlementError::NoEligibleCredit(ClientId::new()).code(),
            SettlementError::InsufficientStock {
                product_id: ProductId::new(),
                requested: 2,
                available: 1,
            }
            .code(),
            SettlementError::InvalidState {
                status: AppointmentStatus::Cancelled,
            }
            .code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn connection_failures_are_retryable() {
        assert!(StoreError::Connection("reset".into()).is_retryable());
        assert!(!StoreError::UniqueViolation("dup".into()).is_retryable());
    }
}
