//! Persistence boundary.
//!
//! [`BookingStore`] serves reads and opens transactions. Every write goes
//! through a [`StoreTransaction`], which must provide:
//!
//! - a commit/rollback boundary; dropping an uncommitted transaction rolls
//!   it back,
//! - a per-date lock ([`lock_day`](StoreTransaction::lock_day)) held until
//!   the transaction ends, serialising overlap-check-then-write on a date,
//! - conditional updates for credits and stock that re-check their guard
//!   at write time instead of trusting an earlier read.

use crate::calendar::{BlockedWindow, WeeklySchedule};
use crate::error::StoreError;
use crate::interval::{BookedInterval, MinuteInterval};
use crate::types::{
    Appointment, AppointmentId, Client, ClientId, CreditCandidate, CreditUsage, FinancialEntry,
    GrantId, GrantStatus, MembershipGrant, MembershipType, MembershipTypeId, Money, Product,
    ProductId, Service, ServiceId, SettlementRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Outcome of a conditional stock decrement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockDecrement {
    /// Stock was reduced; carries the unit price read in the same statement
    Decremented {
        /// Price at decrement time
        unit_price: Money,
        /// Units left
        remaining: u32,
    },
    /// Not enough units; nothing changed
    Insufficient {
        /// Units on hand
        available: u32,
    },
    /// Product is inactive; nothing changed
    Inactive,
    /// No such product
    Missing,
}

/// Read access and transaction factory.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if no connection is available.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Check the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if it is not.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Load a service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn service(&self, id: ServiceId) -> Result<Option<Service>, StoreError>;

    /// Load a client.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError>;

    /// Load an appointment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError>;

    /// Load a product.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Load a membership grant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn grant(&self, id: GrantId) -> Result<Option<MembershipGrant>, StoreError>;

    /// Load a membership plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn membership_type(
        &self,
        id: MembershipTypeId,
    ) -> Result<Option<MembershipType>, StoreError>;

    /// The weekly business hours.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure or an invalid stored schedule.
    async fn weekly_schedule(&self) -> Result<WeeklySchedule, StoreError>;

    /// Blocked windows on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn blocked_windows(&self, date: NaiveDate) -> Result<Vec<BlockedWindow>, StoreError>;

    /// Intervals held on `date` by appointments that occupy the calendar.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<BookedInterval>, StoreError>;

    /// Pending appointments whose unpaid hold lapsed at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<AppointmentId>, StoreError>;

    /// Scheduled or confirmed appointments starting in `[from, until)`
    /// (local time) that have not been reminded yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn reminders_due(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// The settlement record of an appointment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn settlement_for(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<Option<SettlementRecord>, StoreError>;
}

/// A unit of work. Nothing is visible to others until [`commit`](Self::commit).
#[async_trait]
pub trait StoreTransaction: Send {
    /// Take the per-date lock for `date`, blocking until it is free.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn lock_day(&mut self, date: NaiveDate) -> Result<(), StoreError>;

    /// Occupying appointments on `date` whose interval overlaps `span`,
    /// excluding `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn find_overlapping(
        &mut self,
        date: NaiveDate,
        span: MinuteInterval,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<BookedInterval>, StoreError>;

    /// Insert a new appointment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] on a duplicate booking code or
    /// slot index entry.
    async fn insert_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Load and row-lock an appointment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn appointment_for_update(
        &mut self,
        id: AppointmentId,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Persist a changed appointment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Whether a settlement record exists for the appointment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn settlement_exists(&mut self, appointment_id: AppointmentId)
    -> Result<bool, StoreError>;

    /// Grants of `client_id` in status `active`, with their plans.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn credit_candidates(
        &mut self,
        client_id: ClientId,
    ) -> Result<Vec<CreditCandidate>, StoreError>;

    /// Consume one credit if the grant is still active with `used < total`.
    /// Returns the updated grant, or `None` when the guard failed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn consume_credit(&mut self, grant_id: GrantId)
    -> Result<Option<MembershipGrant>, StoreError>;

    /// Append a credit usage row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn record_credit_usage(&mut self, usage: &CreditUsage) -> Result<(), StoreError>;

    /// Decrement stock by `quantity` if at least that many units are on hand.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, StoreError>;

    /// Insert the settlement record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if the appointment already
    /// has one.
    async fn insert_settlement(&mut self, record: &SettlementRecord) -> Result<(), StoreError>;

    /// Append a ledger row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn insert_financial_entry(&mut self, entry: &FinancialEntry) -> Result<(), StoreError>;

    /// Bump visit count and total spent, and set the last visit date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn record_visit(
        &mut self,
        client_id: ClientId,
        spent: Money,
        visit_date: NaiveDate,
    ) -> Result<(), StoreError>;

    /// Insert a new membership grant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn insert_grant(&mut self, grant: &MembershipGrant) -> Result<(), StoreError>;

    /// Load and row-lock a grant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn grant_for_update(&mut self, id: GrantId)
    -> Result<Option<MembershipGrant>, StoreError>;

    /// Change a grant's status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    async fn set_grant_status(&mut self, id: GrantId, status: GrantStatus)
    -> Result<(), StoreError>;

    /// Make every write visible.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the commit fails; nothing is applied then.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the rollback itself fails.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
