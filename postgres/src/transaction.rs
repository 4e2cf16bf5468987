//! [`StoreTransaction`] over a `sqlx` transaction.

use crate::rows::{self, APPOINTMENT_COLUMNS, GRANT_COLUMNS, cents, count, store_error};
use async_trait::async_trait;
use chairbook_core::error::StoreError;
use chairbook_core::interval::{BookedInterval, MinuteInterval};
use chairbook_core::store::{StockDecrement, StoreTransaction};
use chairbook_core::types::{
    Appointment, AppointmentId, ClientId, CreditCandidate, CreditUsage, FinancialEntry, GrantId,
    GrantStatus, MembershipGrant, Money, ProductId, SettlementRecord,
};
use chrono::{Datelike, NaiveDate};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};

/// Advisory lock class for per-date booking locks ("CHBK").
const DAY_LOCK_CLASS: i32 = 0x4348_424B;

/// Booked intervals of occupying appointments, with their service's
/// concurrency flag. Callers append the remaining predicates.
pub(crate) const BOOKED_INTERVALS: &str = "SELECT a.id, a.service_id, s.allows_concurrent, \
    a.start_time, a.end_time \
    FROM appointments a JOIN services s ON s.id = a.service_id \
    WHERE a.date = $1 AND a.status NOT IN ('cancelled', 'no_show')";

/// An open `PostgreSQL` transaction.
///
/// Dropping it without [`commit`](StoreTransaction::commit) rolls back.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_day(&mut self, date: NaiveDate) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(DAY_LOCK_CLASS)
            .bind(date.num_days_from_ce())
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        tracing::trace!(date = %date, "Day lock acquired");
        Ok(())
    }

    async fn find_overlapping(
        &mut self,
        date: NaiveDate,
        span: MinuteInterval,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<BookedInterval>, StoreError> {
        let sql = format!(
            "{BOOKED_INTERVALS} \
             AND FLOOR(EXTRACT(EPOCH FROM a.start_time) / 60)::INTEGER < $3 \
             AND FLOOR(EXTRACT(EPOCH FROM a.end_time) / 60)::INTEGER > $2 \
             AND ($4::UUID IS NULL OR a.id <> $4)"
        );
        let rows = sqlx::query(&sql)
            .bind(date)
            .bind(count(span.start)?)
            .bind(count(span.end)?)
            .bind(exclude.map(|id| *id.as_uuid()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        rows.iter().map(rows::booked_interval).collect()
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        // `exclusive` is copied from the service so the partial slot index
        // can see it
        let inserted = sqlx::query(
            r"
            INSERT INTO appointments (
                id, booking_code, client_id, service_id, date, start_time, end_time,
                status, channel, exclusive, deposit_required, deposit_paid,
                deposit_hold_expires_at, reminder_sent, cancellation_reason, notes,
                created_at, updated_at
            )
            SELECT $1, $2, $3, s.id, $5, $6, $7, $8, $9, NOT s.allows_concurrent,
                   $10, $11, $12, $13, $14, $15, $16, $17
            FROM services s
            WHERE s.id = $4
            ",
        )
        .bind(appointment.id.as_uuid())
        .bind(appointment.booking_code.as_str())
        .bind(appointment.client_id.as_uuid())
        .bind(appointment.service_id.as_uuid())
        .bind(appointment.date)
        .bind(appointment.start)
        .bind(appointment.end)
        .bind(appointment.status.as_str())
        .bind(appointment.channel.as_str())
        .bind(appointment.deposit_required)
        .bind(appointment.deposit_paid)
        .bind(appointment.deposit_hold_expires_at)
        .bind(appointment.reminder_sent)
        .bind(appointment.cancellation_reason.as_deref())
        .bind(appointment.notes.as_deref())
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Query(format!(
                "service {} does not exist",
                appointment.service_id
            )));
        }
        Ok(())
    }

    async fn appointment_for_update(
        &mut self,
        id: AppointmentId,
    ) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1 FOR UPDATE");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?
            .as_ref()
            .map(rows::appointment)
            .transpose()
    }

    async fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r"
            UPDATE appointments
            SET date = $2,
                start_time = $3,
                end_time = $4,
                status = $5,
                deposit_required = $6,
                deposit_paid = $7,
                deposit_hold_expires_at = $8,
                reminder_sent = $9,
                cancellation_reason = $10,
                notes = $11,
                updated_at = $12
            WHERE id = $1
            ",
        )
        .bind(appointment.id.as_uuid())
        .bind(appointment.date)
        .bind(appointment.start)
        .bind(appointment.end)
        .bind(appointment.status.as_str())
        .bind(appointment.deposit_required)
        .bind(appointment.deposit_paid)
        .bind(appointment.deposit_hold_expires_at)
        .bind(appointment.reminder_sent)
        .bind(appointment.cancellation_reason.as_deref())
        .bind(appointment.notes.as_deref())
        .bind(appointment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Query(format!(
                "appointment {} does not exist",
                appointment.id
            )));
        }
        Ok(())
    }

    async fn settlement_exists(
        &mut self,
        appointment_id: AppointmentId,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM settlements WHERE appointment_id = $1) AS settled",
        )
        .bind(appointment_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)?;
        row.try_get("settled").map_err(store_error)
    }

    async fn credit_candidates(
        &mut self,
        client_id: ClientId,
    ) -> Result<Vec<CreditCandidate>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT g.id, g.client_id, g.membership_type_id, g.total_credits, g.used_credits,
                   g.status, g.expires_on, g.activated_at,
                   t.name, t.eligible_services
            FROM membership_grants g
            JOIN membership_types t ON t.id = g.membership_type_id
            WHERE g.client_id = $1 AND g.status = 'active'
            ",
        )
        .bind(client_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(|row| {
                let grant = rows::grant(row)?;
                let membership_type = rows::membership_type_of(row, grant.membership_type_id)?;
                Ok(CreditCandidate {
                    grant,
                    membership_type,
                })
            })
            .collect()
    }

    async fn consume_credit(
        &mut self,
        grant_id: GrantId,
    ) -> Result<Option<MembershipGrant>, StoreError> {
        // Guard re-checked by the UPDATE itself
        let sql = format!(
            "UPDATE membership_grants SET used_credits = used_credits + 1 \
             WHERE id = $1 AND status = 'active' AND used_credits < total_credits \
             RETURNING {GRANT_COLUMNS}"
        );
        sqlx::query(&sql)
            .bind(grant_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?
            .as_ref()
            .map(rows::grant)
            .transpose()
    }

    async fn record_credit_usage(&mut self, usage: &CreditUsage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO credit_usages (grant_id, appointment_id, used_at) VALUES ($1, $2, $3)",
        )
        .bind(usage.grant_id.as_uuid())
        .bind(usage.appointment_id.as_uuid())
        .bind(usage.used_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, StoreError> {
        let quantity = count(quantity)?;
        let decremented = sqlx::query(
            r"
            UPDATE products SET stock = stock - $2
            WHERE id = $1 AND active AND stock >= $2
            RETURNING price_cents, stock
            ",
        )
        .bind(product_id.as_uuid())
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        if let Some(row) = decremented {
            let price: i64 = row.try_get("price_cents").map_err(store_error)?;
            let remaining: i32 = row.try_get("stock").map_err(store_error)?;
            return Ok(StockDecrement::Decremented {
                unit_price: Money::from_cents(u64::try_from(price).map_err(|_| {
                    StoreError::Corrupt(format!("product {product_id} has a negative price"))
                })?),
                remaining: u32::try_from(remaining).unwrap_or(0),
            });
        }

        let current = sqlx::query("SELECT active, stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        let Some(row) = current else {
            return Ok(StockDecrement::Missing);
        };
        let active: bool = row.try_get("active").map_err(store_error)?;
        if !active {
            return Ok(StockDecrement::Inactive);
        }
        let available: i32 = row.try_get("stock").map_err(store_error)?;
        Ok(StockDecrement::Insufficient {
            available: u32::try_from(available).unwrap_or(0),
        })
    }

    async fn insert_settlement(&mut self, record: &SettlementRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO settlements (
                id, appointment_id, client_id, service_cost_cents, product_cost_cents,
                discount_cents, total_cents, payment_method, membership_credit_used,
                membership_grant_id, lines, settled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(record.id.as_uuid())
        .bind(record.appointment_id.as_uuid())
        .bind(record.client_id.as_uuid())
        .bind(cents(record.breakdown.service_cost)?)
        .bind(cents(record.breakdown.product_cost)?)
        .bind(cents(record.breakdown.discount)?)
        .bind(cents(record.breakdown.total)?)
        .bind(record.payment_method.as_str())
        .bind(record.membership_credit_used)
        .bind(record.membership_grant_id.map(|id| *id.as_uuid()))
        .bind(Json(&record.lines))
        .bind(record.settled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn insert_financial_entry(&mut self, entry: &FinancialEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO financial_entries (
                id, settlement_id, appointment_id, client_id, amount_cents,
                payment_method, entry_date, description, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.settlement_id.as_uuid())
        .bind(entry.appointment_id.as_uuid())
        .bind(entry.client_id.as_uuid())
        .bind(cents(entry.amount)?)
        .bind(entry.payment_method.as_str())
        .bind(entry.entry_date)
        .bind(&entry.description)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn record_visit(
        &mut self,
        client_id: ClientId,
        spent: Money,
        visit_date: NaiveDate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE clients
            SET visit_count = visit_count + 1,
                total_spent_cents = total_spent_cents + $2,
                last_visit = GREATEST(COALESCE(last_visit, $3), $3)
            WHERE id = $1
            ",
        )
        .bind(client_id.as_uuid())
        .bind(cents(spent)?)
        .bind(visit_date)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn insert_grant(&mut self, grant: &MembershipGrant) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO membership_grants (
                id, client_id, membership_type_id, total_credits, used_credits,
                status, expires_on, activated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(grant.id.as_uuid())
        .bind(grant.client_id.as_uuid())
        .bind(grant.membership_type_id.as_uuid())
        .bind(count(grant.total_credits)?)
        .bind(count(grant.used_credits)?)
        .bind(grant.status.as_str())
        .bind(grant.expires_on)
        .bind(grant.activated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn grant_for_update(
        &mut self,
        id: GrantId,
    ) -> Result<Option<MembershipGrant>, StoreError> {
        let sql = format!("SELECT {GRANT_COLUMNS} FROM membership_grants WHERE id = $1 FOR UPDATE");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?
            .as_ref()
            .map(rows::grant)
            .transpose()
    }

    async fn set_grant_status(
        &mut self,
        id: GrantId,
        status: GrantStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE membership_grants SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("commit failed: {e}")))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::Transaction(format!("rollback failed: {e}")))
    }
}
