//! In-memory booking store with real transaction semantics.
//!
//! A transaction holds the store's mutex for its whole lifetime and works
//! on a private copy of the data; `commit` swaps the copy in, `rollback` or
//! drop discards it. Transactions are therefore fully serialised, which is
//! stronger than the per-date locking a database store provides but gives
//! the same observable guarantees to the engine.
//!
//! Do not call [`BookingStore`] read methods while holding a transaction on
//! the same task: the read waits for the transaction's lock.

use async_trait::async_trait;
use chairbook_core::calendar::{BlockedWindow, WeeklySchedule};
use chairbook_core::error::StoreError;
use chairbook_core::interval::{BookedInterval, MinuteInterval};
use chairbook_core::store::{BookingStore, StockDecrement, StoreTransaction};
use chairbook_core::types::{
    Appointment, AppointmentId, AppointmentStatus, Client, ClientId, CreditCandidate, CreditUsage,
    FinancialEntry, GrantId, GrantStatus, MembershipGrant, MembershipType, MembershipTypeId,
    Money, Product, ProductId, Service, ServiceId, SettlementRecord,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Write steps that can be made to fail, to exercise rollback paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `insert_appointment`
    InsertAppointment,
    /// `update_appointment`
    UpdateAppointment,
    /// `insert_settlement`
    InsertSettlement,
    /// `insert_financial_entry`
    FinancialEntry,
    /// `record_visit`
    RecordVisit,
    /// `commit`
    Commit,
}

/// Everything the in-memory store holds.
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    /// Services by id
    pub services: HashMap<ServiceId, Service>,
    /// Clients by id
    pub clients: HashMap<ClientId, Client>,
    /// Appointments by id
    pub appointments: HashMap<AppointmentId, Appointment>,
    /// Weekly business hours
    pub schedule: WeeklySchedule,
    /// Blocked windows
    pub blocked: Vec<BlockedWindow>,
    /// Membership plans by id
    pub membership_types: HashMap<MembershipTypeId, MembershipType>,
    /// Grants by id
    pub grants: HashMap<GrantId, MembershipGrant>,
    /// Credit usage log
    pub credit_usages: Vec<CreditUsage>,
    /// Products by id
    pub products: HashMap<ProductId, Product>,
    /// Settlement records by appointment
    pub settlements: HashMap<AppointmentId, SettlementRecord>,
    /// Ledger
    pub financial_entries: Vec<FinancialEntry>,
    /// Steps that fail with a query error
    pub fail_points: HashSet<FailPoint>,
}

impl MemoryState {
    /// Add a service
    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.services.insert(service.id, service);
        self
    }

    /// Add a client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.clients.insert(client.id, client);
        self
    }

    /// Add an appointment
    #[must_use]
    pub fn with_appointment(mut self, appointment: Appointment) -> Self {
        self.appointments.insert(appointment.id, appointment);
        self
    }

    /// Set the weekly schedule
    #[must_use]
    pub fn with_schedule(mut self, schedule: WeeklySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Add a blocked window
    #[must_use]
    pub fn with_blocked(mut self, window: BlockedWindow) -> Self {
        self.blocked.push(window);
        self
    }

    /// Add a membership plan
    #[must_use]
    pub fn with_membership_type(mut self, membership_type: MembershipType) -> Self {
        self.membership_types
            .insert(membership_type.id, membership_type);
        self
    }

    /// Add a grant
    #[must_use]
    pub fn with_grant(mut self, grant: MembershipGrant) -> Self {
        self.grants.insert(grant.id, grant);
        self
    }

    /// Add a product
    #[must_use]
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.id, product);
        self
    }

    fn allows_concurrent(&self, service_id: ServiceId) -> bool {
        self.services
            .get(&service_id)
            .is_some_and(|service| service.allows_concurrent)
    }

    fn booked_on(&self, date: NaiveDate) -> impl Iterator<Item = BookedInterval> + '_ {
        self.appointments
            .values()
            .filter(move |a| a.date == date && a.status.occupies_calendar())
            .map(|a| BookedInterval {
                appointment_id: a.id,
                service_id: a.service_id,
                allows_concurrent: self.allows_concurrent(a.service_id),
                span: a.span(),
            })
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.fail_points.contains(&point) {
            return Err(StoreError::Query(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    /// Mirrors the partial unique index on `(date, start)` for occupying
    /// appointments of exclusive services.
    fn slot_taken(&self, candidate: &Appointment) -> bool {
        if self.allows_concurrent(candidate.service_id) {
            return false;
        }
        self.appointments.values().any(|other| {
            other.id != candidate.id
                && other.status.occupies_calendar()
                && other.date == candidate.date
                && other.start == candidate.start
                && !self.allows_concurrent(other.service_id)
        })
    }
}

/// In-memory [`BookingStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBookingStore {
    /// Store seeded with `state`
    #[must_use]
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the committed data
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Apply a change to the committed data directly
    pub async fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        change(&mut *self.state.lock().await);
    }

    /// Make `point` fail until cleared
    pub async fn fail_at(&self, point: FailPoint) {
        self.state.lock().await.fail_points.insert(point);
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn service(&self, id: ServiceId) -> Result<Option<Service>, StoreError> {
        Ok(self.state.lock().await.services.get(&id).cloned())
    }

    async fn client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.state.lock().await.clients.get(&id).cloned())
    }

    async fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state.lock().await.appointments.get(&id).cloned())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn grant(&self, id: GrantId) -> Result<Option<MembershipGrant>, StoreError> {
        Ok(self.state.lock().await.grants.get(&id).cloned())
    }

    async fn membership_type(
        &self,
        id: MembershipTypeId,
    ) -> Result<Option<MembershipType>, StoreError> {
        Ok(self.state.lock().await.membership_types.get(&id).cloned())
    }

    async fn weekly_schedule(&self) -> Result<WeeklySchedule, StoreError> {
        Ok(self.state.lock().await.schedule.clone())
    }

    async fn blocked_windows(&self, date: NaiveDate) -> Result<Vec<BlockedWindow>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .blocked
            .iter()
            .filter(|window| window.date == date)
            .cloned()
            .collect())
    }

    async fn booked_intervals(&self, date: NaiveDate) -> Result<Vec<BookedInterval>, StoreError> {
        Ok(self.state.lock().await.booked_on(date).collect())
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<AppointmentId>, StoreError> {
        let state = self.state.lock().await;
        let mut expired: Vec<&Appointment> = state
            .appointments
            .values()
            .filter(|a| a.hold_expired(now))
            .collect();
        expired.sort_by_key(|a| a.deposit_hold_expires_at);
        Ok(expired.into_iter().map(|a| a.id).collect())
    }

    async fn reminders_due(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.lock().await;
        let mut due: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| {
                matches!(
                    a.status,
                    AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
                ) && !a.reminder_sent
                    && a.starts_at() >= from
                    && a.starts_at() < until
            })
            .cloned()
            .collect();
        due.sort_by_key(Appointment::starts_at);
        Ok(due)
    }

    async fn settlement_for(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<Option<SettlementRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .settlements
            .get(&appointment_id)
            .cloned())
    }
}

/// Transaction over [`InMemoryBookingStore`].
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_day(&mut self, _date: NaiveDate) -> Result<(), StoreError> {
        // The guard already serializes every transaction.
        Ok(())
    }

    async fn find_overlapping(
        &mut self,
        date: NaiveDate,
        span: MinuteInterval,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<BookedInterval>, StoreError> {
        Ok(self
            .working
            .booked_on(date)
            .filter(|b| Some(b.appointment_id) != exclude && b.span.overlaps(&span))
            .collect())
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        self.working.check(FailPoint::InsertAppointment)?;
        if self.working.appointments.contains_key(&appointment.id) {
            return Err(StoreError::UniqueViolation("appointments_pkey".to_string()));
        }
        if self
            .working
            .appointments
            .values()
            .any(|other| other.booking_code == appointment.booking_code)
        {
            return Err(StoreError::UniqueViolation(
                "appointments_booking_code_key".to_string(),
            ));
        }
        if self.working.slot_taken(appointment) {
            return Err(StoreError::UniqueViolation(
                "appointments_exclusive_slot_idx".to_string(),
            ));
        }
        self.working
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn appointment_for_update(
        &mut self,
        id: AppointmentId,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self.working.appointments.get(&id).cloned())
    }

    async fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        self.working.check(FailPoint::UpdateAppointment)?;
        if self.working.slot_taken(appointment) && appointment.status.occupies_calendar() {
            return Err(StoreError::UniqueViolation(
                "appointments_exclusive_slot_idx".to_string(),
            ));
        }
        match self.working.appointments.get_mut(&appointment.id) {
            Some(stored) => {
                *stored = appointment.clone();
                Ok(())
            }
            None => Err(StoreError::Query(format!(
                "appointment {} does not exist",
                appointment.id
            ))),
        }
    }

    async fn settlement_exists(
        &mut self,
        appointment_id: AppointmentId,
    ) -> Result<bool, StoreError> {
        Ok(self.working.settlements.contains_key(&appointment_id))
    }

    async fn credit_candidates(
        &mut self,
        client_id: ClientId,
    ) -> Result<Vec<CreditCandidate>, StoreError> {
        let state = &self.working;
        Ok(state
            .grants
            .values()
            .filter(|grant| grant.client_id == client_id && grant.status == GrantStatus::Active)
            .filter_map(|grant| {
                state
                    .membership_types
                    .get(&grant.membership_type_id)
                    .map(|membership_type| CreditCandidate {
                        grant: grant.clone(),
                        membership_type: membership_type.clone(),
                    })
            })
            .collect())
    }

    async fn consume_credit(
        &mut self,
        grant_id: GrantId,
    ) -> Result<Option<MembershipGrant>, StoreError> {
        match self.working.grants.get_mut(&grant_id) {
            Some(grant)
                if grant.status == GrantStatus::Active
                    && grant.used_credits < grant.total_credits =>
            {
                grant.used_credits += 1;
                Ok(Some(grant.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_credit_usage(&mut self, usage: &CreditUsage) -> Result<(), StoreError> {
        self.working.credit_usages.push(usage.clone());
        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, StoreError> {
        let Some(product) = self.working.products.get_mut(&product_id) else {
            return Ok(StockDecrement::Missing);
        };
        if !product.active {
            return Ok(StockDecrement::Inactive);
        }
        if product.stock < quantity {
            return Ok(StockDecrement::Insufficient {
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(StockDecrement::Decremented {
            unit_price: product.price,
            remaining: product.stock,
        })
    }

    async fn insert_settlement(&mut self, record: &SettlementRecord) -> Result<(), StoreError> {
        self.working.check(FailPoint::InsertSettlement)?;
        if self.working.settlements.contains_key(&record.appointment_id) {
            return Err(StoreError::UniqueViolation(
                "settlements_appointment_id_key".to_string(),
            ));
        }
        self.working
            .settlements
            .insert(record.appointment_id, record.clone());
        Ok(())
    }

    async fn insert_financial_entry(&mut self, entry: &FinancialEntry) -> Result<(), StoreError> {
        self.working.check(FailPoint::FinancialEntry)?;
        self.working.financial_entries.push(entry.clone());
        Ok(())
    }

    async fn record_visit(
        &mut self,
        client_id: ClientId,
        spent: Money,
        visit_date: NaiveDate,
    ) -> Result<(), StoreError> {
        self.working.check(FailPoint::RecordVisit)?;
        if let Some(client) = self.working.clients.get_mut(&client_id) {
            client.visit_count += 1;
            client.total_spent = client.total_spent.checked_add(spent).unwrap_or(client.total_spent);
            client.last_visit = Some(client.last_visit.map_or(visit_date, |d| d.max(visit_date)));
        }
        Ok(())
    }

    async fn insert_grant(&mut self, grant: &MembershipGrant) -> Result<(), StoreError> {
        self.working.grants.insert(grant.id, grant.clone());
        Ok(())
    }

    async fn grant_for_update(
        &mut self,
        id: GrantId,
    ) -> Result<Option<MembershipGrant>, StoreError> {
        Ok(self.working.grants.get(&id).cloned())
    }

    async fn set_grant_status(
        &mut self,
        id: GrantId,
        status: GrantStatus,
    ) -> Result<(), StoreError> {
        if let Some(grant) = self.working.grants.get_mut(&id) {
            grant.status = status;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        working.check(FailPoint::Commit)?;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let client = fixtures::returning_client();
        let store = InMemoryBookingStore::new(MemoryState::default().with_client(client.clone()));

        let mut tx = store.begin().await.unwrap();
        tx.record_visit(client.id, Money::from_cents(100), fixtures::monday())
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let after = store.client(client.id).await.unwrap().unwrap();
        assert_eq!(after.visit_count, client.visit_count);
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let product = fixtures::product(3, 500);
        let store = InMemoryBookingStore::new(MemoryState::default().with_product(product.clone()));

        let mut tx = store.begin().await.unwrap();
        let outcome = tx.decrement_stock(product.id, 2).await.unwrap();
        assert_eq!(
            outcome,
            StockDecrement::Decremented {
                unit_price: Money::from_cents(500),
                remaining: 1
            }
        );
        assert_eq!(
            tx.decrement_stock(product.id, 2).await.unwrap(),
            StockDecrement::Insufficient { available: 1 }
        );
        tx.commit().await.unwrap();

        assert_eq!(store.product(product.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let client = fixtures::returning_client();
        let store = InMemoryBookingStore::new(MemoryState::default().with_client(client.clone()));
        store.fail_at(FailPoint::Commit).await;

        let mut tx = store.begin().await.unwrap();
        tx.record_visit(client.id, Money::from_cents(100), fixtures::monday())
            .await
            .unwrap();
        assert!(tx.commit().await.is_err());

        let after = store.client(client.id).await.unwrap().unwrap();
        assert_eq!(after.visit_count, client.visit_count);
    }
}
