//! Reference data: services, clients, products, plans and the calendar.
//!
//! The engine only reads these. The writes here exist for provisioning
//! and tests.

use crate::PostgresBookingStore;
use crate::rows::{cents, count, store_error};
use chairbook_core::calendar::{BlockedWindow, WeeklySchedule};
use chairbook_core::error::StoreError;
use chairbook_core::types::{Client, MembershipType, Product, Service};
use uuid::Uuid;

impl PostgresBookingStore {
    /// Insert or replace a service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn upsert_service(&self, service: &Service) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO services (id, name, duration_minutes, price_cents, allows_concurrent, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                duration_minutes = EXCLUDED.duration_minutes,
                price_cents = EXCLUDED.price_cents,
                allows_concurrent = EXCLUDED.allows_concurrent,
                active = EXCLUDED.active
            ",
        )
        .bind(service.id.as_uuid())
        .bind(&service.name)
        .bind(count(service.duration_minutes)?)
        .bind(cents(service.price)?)
        .bind(service.allows_concurrent)
        .bind(service.active)
        .execute(self.pool())
        .await
        .map_err(store_error)?;
        Ok(())
    }

    /// Insert or replace a client, visit aggregates included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn upsert_client(&self, client: &Client) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO clients (id, name, email, phone, visit_count, total_spent_cents, last_visit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                visit_count = EXCLUDED.visit_count,
                total_spent_cents = EXCLUDED.total_spent_cents,
                last_visit = EXCLUDED.last_visit
            ",
        )
        .bind(client.id.as_uuid())
        .bind(&client.contact.name)
        .bind(client.contact.email.as_deref())
        .bind(client.contact.phone.as_deref())
        .bind(count(client.visit_count)?)
        .bind(cents(client.total_spent)?)
        .bind(client.last_visit)
        .execute(self.pool())
        .await
        .map_err(store_error)?;
        Ok(())
    }

    /// Insert or replace a product.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO products (id, name, stock, price_cents, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                stock = EXCLUDED.stock,
                price_cents = EXCLUDED.price_cents,
                active = EXCLUDED.active
            ",
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(count(product.stock)?)
        .bind(cents(product.price)?)
        .bind(product.active)
        .execute(self.pool())
        .await
        .map_err(store_error)?;
        Ok(())
    }

    /// Insert or replace a membership plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn upsert_membership_type(
        &self,
        membership_type: &MembershipType,
    ) -> Result<(), StoreError> {
        let eligible: Vec<Uuid> = membership_type
            .eligible_services
            .iter()
            .map(|id| *id.as_uuid())
            .collect();
        sqlx::query(
            r"
            INSERT INTO membership_types (id, name, eligible_services)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, eligible_services = EXCLUDED.eligible_services
            ",
        )
        .bind(membership_type.id.as_uuid())
        .bind(&membership_type.name)
        .bind(eligible)
        .execute(self.pool())
        .await
        .map_err(store_error)?;
        Ok(())
    }

    /// Replace the weekly business hours.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    pub async fn replace_schedule(&self, schedule: &WeeklySchedule) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await.map_err(store_error)?;
        sqlx::query("DELETE FROM business_hours")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        for hours in schedule.days() {
            sqlx::query(
                r"
                INSERT INTO business_hours
                    (weekday, is_open, open_time, close_time, break_start, break_end)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(i16::from(hours.weekday))
            .bind(hours.is_open)
            .bind(hours.open)
            .bind(hours.close)
            .bind(hours.break_window.map(|window| window.start))
            .bind(hours.break_window.map(|window| window.end))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    /// Add a blocked window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] for an inverted window, or on storage
    /// failure.
    pub async fn add_blocked_window(&self, window: &BlockedWindow) -> Result<(), StoreError> {
        window
            .validate()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        sqlx::query(
            "INSERT INTO blocked_windows (date, start_time, end_time, reason) VALUES ($1, $2, $3, $4)",
        )
        .bind(window.date)
        .bind(window.start)
        .bind(window.end)
        .bind(&window.reason)
        .execute(self.pool())
        .await
        .map_err(store_error)?;
        Ok(())
    }
}
