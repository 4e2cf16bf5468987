//! HTTP surface for Chairbook.
//!
//! Handlers are thin: they parse the request, call one runtime service and
//! map the outcome. Transaction boundaries, locking and event publication
//! all live in `chairbook-runtime`.
//!
//! # Request Flow
//!
//! ```text
//! HTTP request ─► handler ─► BookingService / SettlementService / MembershipService
//!                                   │ commit
//!                                   ▼
//!                              EventBus ─► CollaboratorDispatcher ─► notifier, calendar
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chairbook_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(&env));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod console;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use router::{build_router, metrics_router};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
