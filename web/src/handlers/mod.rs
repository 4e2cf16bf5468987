//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod appointments;
pub mod health;
pub mod memberships;
pub mod settlements;
pub mod slots;

pub use health::{health_check, readiness_check};
