//! Prometheus metrics for bookings, settlements and background jobs.
//!
//! Counters are recorded through the small recorder types below so metric
//! names live in one place. [`MetricsServer`] installs the Prometheus
//! recorder; the server binary exposes [`MetricsServer::render`] on its
//! metrics port.
//!
//! # Example
//!
//! ```rust,no_run
//! use chairbook_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address it should be served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server for `addr`; nothing is installed until [`start`](Self::start).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the binary should serve `/metrics` on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built, or if a
    /// different recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_business_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Handle for rendering, once started
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Current metrics in Prometheus text format, once started
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for every Chairbook metric.
pub fn register_business_metrics() {
    describe_counter!(
        "chairbook_bookings_total",
        "Booking attempts by outcome (created, conflict, rejected, failed)"
    );
    describe_counter!(
        "chairbook_booking_conflicts_total",
        "Bookings and reschedules refused because the interval was taken"
    );
    describe_histogram!(
        "chairbook_booking_duration_seconds",
        "Time taken to reserve an interval"
    );
    describe_counter!(
        "chairbook_transitions_total",
        "Accepted lifecycle transitions by target status"
    );
    describe_counter!(
        "chairbook_settlements_total",
        "Settlement attempts by outcome"
    );
    describe_counter!(
        "chairbook_settlement_revenue_cents_total",
        "Revenue recorded by settlements, in cents"
    );
    describe_counter!(
        "chairbook_sweeper_cancelled_total",
        "Pending appointments cancelled because their deposit hold lapsed"
    );
    describe_counter!(
        "chairbook_sweeper_failures_total",
        "Appointments the sweeper failed to process"
    );
    describe_counter!(
        "chairbook_notifications_total",
        "Outbound deliveries by kind and outcome"
    );
}

/// Booking metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// A booking attempt finished with `outcome`
    pub fn record_attempt(outcome: &'static str, duration: Duration) {
        counter!("chairbook_bookings_total", "outcome" => outcome).increment(1);
        histogram!("chairbook_booking_duration_seconds").record(duration.as_secs_f64());
    }

    /// An interval was refused because it was taken
    pub fn record_conflict() {
        counter!("chairbook_booking_conflicts_total").increment(1);
    }

    /// A lifecycle transition was committed
    pub fn record_transition(to: &'static str) {
        counter!("chairbook_transitions_total", "to" => to).increment(1);
    }
}

/// Settlement metrics recorder.
pub struct SettlementMetrics;

impl SettlementMetrics {
    /// A settlement committed with `revenue_cents` recorded
    pub fn record_settled(revenue_cents: u64) {
        counter!("chairbook_settlements_total", "outcome" => "settled").increment(1);
        counter!("chairbook_settlement_revenue_cents_total").increment(revenue_cents);
    }

    /// A settlement was refused or failed; `code` is the error code
    pub fn record_rejected(code: &'static str) {
        counter!("chairbook_settlements_total", "outcome" => code).increment(1);
    }
}

/// Background job metrics recorder.
pub struct JobMetrics;

impl JobMetrics {
    /// The sweeper cancelled an appointment
    pub fn record_expired() {
        counter!("chairbook_sweeper_cancelled_total").increment(1);
    }

    /// The sweeper could not process an appointment
    pub fn record_sweep_failure() {
        counter!("chairbook_sweeper_failures_total").increment(1);
    }

    /// An outbound delivery finished
    pub fn record_delivery(kind: &'static str, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "failed" };
        counter!("chairbook_notifications_total", "kind" => kind, "outcome" => outcome)
            .increment(1);
    }
}
