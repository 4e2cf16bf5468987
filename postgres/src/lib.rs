//! `PostgreSQL` persistence for Chairbook.
//!
//! [`PostgresBookingStore`] implements the `BookingStore` and
//! `StoreTransaction` traits from `chairbook-core` on a sqlx pool:
//!
//! - per-date `pg_advisory_xact_lock` serialising overlap-check-then-insert
//! - a partial unique index on `(date, start_time)` for occupying
//!   appointments of exclusive services
//! - conditional `UPDATE ... RETURNING` for membership credits and stock
//! - row locks (`FOR UPDATE`) for status transitions
//!
//! # Example
//!
//! ```ignore
//! use chairbook_postgres::{PoolOptions, PostgresBookingStore};
//!
//! let store = PostgresBookingStore::connect("postgres://localhost/chairbook", &PoolOptions::default()).await?;
//! store.migrate().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
mod rows;
mod transaction;

pub use transaction::PgTransaction;

use async_trait::async_trait;
use chairbook_core::calendar::{BlockedWindow, WeeklySchedule};
use chairbook_core::error::StoreError;
use chairbook_core::interval::BookedInterval;
use chairbook_core::store::{BookingStore, StoreTransaction};
use chairbook_core::types::{
    Appointment, AppointmentId, Client, ClientId, GrantId, MembershipGrant, MembershipType,
    MembershipTypeId, Product, ProductId, Service, ServiceId, SettlementRecord,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rows::{APPOINTMENT_COLUMNS, GRANT_COLUMNS, store_error};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use transaction::BOOKED_INTERVALS;

/// Connection pool sizing.
#[derive(Clone, Debug)]
pub struct PoolOptions {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// `PostgreSQL`-backed [`BookingStore`].
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if no connection can be made.
    pub async fn connect(database_url: &str, options: &PoolOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_one_of<T>(
        &self,
        sql: &str,
        id: &uuid::Uuid,
        decode: fn(&sqlx::postgres::PgRow) -> Result<T, StoreError>,
    ) -> Result<Option<T>, StoreError> {
        sqlx::query(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .as_ref()
            .map(decode)
            .transpose()
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgTransaction::new(tx)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn service(&self, id: ServiceId) -> Result<Option<Service>, StoreError> {
        self.fetch_one_of(
            "SELECT id, name, duration_minutes, price_cents, allows_concurrent, active \
             FROM services WHERE id = $1",
            id.as_uuid(),
            rows::service,
        )
        .await
    }

    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        self.fetch_one_of(
            "SELECT id, name, email, phone, visit_count, total_spent_cents, last_visit \
             FROM clients WHERE id = $1",
            id.as_uuid(),
            rows::client,
        )
        .await
    }

    async fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1");
        self.fetch_one_of(&sql, id.as_uuid(), rows::appointment).await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.fetch_one_of(
            "SELECT id, name, stock, price_cents, active FROM products WHERE id = $1",
            id.as_uuid(),
            rows::product,
        )
        .await
    }

    async fn grant(&self, id: GrantId) -> Result<Option<MembershipGrant>, StoreError> {
        let sql = format!("SELECT {GRANT_COLUMNS} FROM membership_grants WHERE id = $1");
        self.fetch_one_of(&sql, id.as_uuid(), rows::grant).await
    }

    async fn membership_type(
        &self,
        id: MembershipTypeId,
    ) -> Result<Option<MembershipType>, StoreError> {
        self.fetch_one_of(
            "SELECT id, name, eligible_services FROM membership_types WHERE id = $1",
            id.as_uuid(),
            rows::membership_type,
        )
        .await
    }

    async fn weekly_schedule(&self) -> Result<WeeklySchedule, StoreError> {
        let rows = sqlx::query(
            "SELECT weekday, is_open, open_time, close_time, break_start, break_end \
             FROM business_hours ORDER BY weekday",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let hours = rows
            .iter()
            .map(rows::business_hours)
            .collect::<Result<Vec<_>, _>>()?;
        WeeklySchedule::new(hours).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn blocked_windows(&self, date: NaiveDate) -> Result<Vec<BlockedWindow>, StoreError> {
        let rows = sqlx::query(
            "SELECT date, start_time, end_time, reason FROM blocked_windows \
             WHERE date = $1 ORDER BY start_time NULLS FIRST",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.iter().map(rows::blocked_window).collect()
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<BookedInterval>, StoreError> {
        let sql = format!("{BOOKED_INTERVALS} ORDER BY a.start_time");
        let rows = sqlx::query(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.iter().map(rows::booked_interval).collect()
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<AppointmentId>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id FROM appointments
            WHERE status = 'pending'
              AND NOT deposit_paid
              AND deposit_hold_expires_at <= $1
            ORDER BY deposit_hold_expires_at
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(|row| {
                sqlx::Row::try_get(row, "id")
                    .map(AppointmentId::from_uuid)
                    .map_err(store_error)
            })
            .collect()
    }

    async fn reminders_due(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
             WHERE status IN ('scheduled', 'confirmed') \
               AND NOT reminder_sent \
               AND date + start_time >= $1 \
               AND date + start_time < $2 \
             ORDER BY date, start_time"
        );
        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.iter().map(rows::appointment).collect()
    }

    async fn settlement_for(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<Option<SettlementRecord>, StoreError> {
        self.fetch_one_of(
            "SELECT id, appointment_id, client_id, service_cost_cents, product_cost_cents, \
             discount_cents, total_cents, payment_method, membership_credit_used, \
             membership_grant_id, lines, settled_at \
             FROM settlements WHERE appointment_id = $1",
            appointment_id.as_uuid(),
            rows::settlement,
        )
        .await
    }
}
