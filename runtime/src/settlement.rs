//! Settlement Transaction.
//!
//! Checkout of one appointment as a single atomic unit: completion,
//! membership credit, stock, settlement record, ledger entry and client
//! visit statistics either all commit or none do.

use crate::metrics::SettlementMetrics;
use crate::{EngineEnvironment, abandon};
use chairbook_core::error::{LifecycleError, SettlementError, StoreError};
use chairbook_core::events::DomainEvent;
use chairbook_core::lifecycle::{AppointmentAction, AppointmentReducer};
use chairbook_core::reducer::Reducer;
use chairbook_core::settlement::{eligible_grants, validate_request};
use chairbook_core::store::{StockDecrement, StoreTransaction};
use chairbook_core::types::{
    Appointment, CreditUsage, FinancialEntry, FinancialEntryId, GrantId, Money, SettlementId,
    SettlementLine, SettlementRecord, SettlementRequest,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Settles appointments.
#[derive(Clone)]
pub struct SettlementService {
    env: EngineEnvironment,
    reducer: AppointmentReducer,
}

struct Settled {
    appointment: Appointment,
    record: SettlementRecord,
}

impl SettlementService {
    /// Create the service
    #[must_use]
    pub const fn new(env: EngineEnvironment) -> Self {
        Self {
            env,
            reducer: AppointmentReducer,
        }
    }

    /// Settle the appointment named in `request`.
    ///
    /// On success the appointment is `completed`, at most one membership
    /// credit was consumed, stock for every product line was decremented,
    /// and a settlement record plus (for a non-zero total) a ledger entry
    /// exist. On any error nothing was written.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::Validation`] for an inconsistent request
    /// - [`SettlementError::NotFound`] for an unknown appointment or product
    /// - [`SettlementError::AlreadySettled`] if a record already exists
    /// - [`SettlementError::InvalidState`] if the appointment cannot be settled
    /// - [`SettlementError::NoEligibleCredit`] if credit was requested but
    ///   none can be consumed
    /// - [`SettlementError::InsufficientStock`] if a product line exceeds stock
    /// - [`SettlementError::Store`] on storage failure
    #[tracing::instrument(skip(self, request), fields(appointment_id = %request.appointment_id))]
    pub async fn settle(
        &self,
        request: SettlementRequest,
    ) -> Result<SettlementRecord, SettlementError> {
        match self.settle_inner(&request).await {
            Ok(Settled {
                appointment,
                record,
            }) => {
                SettlementMetrics::record_settled(record.breakdown.total.cents());
                tracing::info!(
                    settlement_id = %record.id,
                    total = %record.breakdown.total,
                    payment_method = record.payment_method.as_str(),
                    membership_credit_used = record.membership_credit_used,
                    "Appointment settled"
                );
                self.env
                    .publish_all([DomainEvent::AppointmentSettled {
                        appointment,
                        settlement: record.clone(),
                    }])
                    .await;
                Ok(record)
            }
            Err(err) => {
                SettlementMetrics::record_rejected(err.code());
                tracing::warn!(code = err.code(), error = %err, "Settlement refused");
                Err(err)
            }
        }
    }

    async fn settle_inner(&self, request: &SettlementRequest) -> Result<Settled, SettlementError> {
        validate_request(request, self.env.settings.max_product_lines)?;

        let now = self.env.clock.now();
        let today = self.env.local_now().date();

        let mut tx = self.env.store.begin().await?;
        match self.write_settlement(tx.as_mut(), request, now, today).await {
            Ok(settled) => {
                tx.commit().await?;
                Ok(settled)
            }
            Err(err) => {
                abandon(tx).await;
                Err(err)
            }
        }
    }

    async fn write_settlement(
        &self,
        tx: &mut dyn StoreTransaction,
        request: &SettlementRequest,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Settled, SettlementError> {
        let id = request.appointment_id;
        let current = tx
            .appointment_for_update(id)
            .await?
            .ok_or_else(|| SettlementError::not_found("appointment", id))?;

        if tx.settlement_exists(id).await? {
            return Err(SettlementError::AlreadySettled(id));
        }

        let mut appointment = current;
        self.reducer
            .reduce(&mut appointment, AppointmentAction::Settle, &self.env.lifecycle())
            .map_err(|err| match err {
                LifecycleError::InvalidTransition { from, .. } => {
                    SettlementError::InvalidState { status: from }
                }
                LifecycleError::Validation(message) => SettlementError::Validation(message),
            })?;

        let membership_grant_id = if request.use_membership_credit {
            Some(consume_one_credit(tx, &appointment, today, now).await?)
        } else {
            None
        };

        let mut lines = Vec::with_capacity(request.product_lines.len());
        for line in &request.product_lines {
            let unit_price = match tx.decrement_stock(line.product_id, line.quantity).await? {
                StockDecrement::Decremented { unit_price, .. } => unit_price,
                StockDecrement::Insufficient { available } => {
                    return Err(SettlementError::InsufficientStock {
                        product_id: line.product_id,
                        requested: line.quantity,
                        available,
                    });
                }
                StockDecrement::Inactive => {
                    return Err(SettlementError::Validation(format!(
                        "product {} is not for sale",
                        line.product_id
                    )));
                }
                StockDecrement::Missing => {
                    return Err(SettlementError::not_found("product", line.product_id));
                }
            };
            let line_total = unit_price.checked_mul(line.quantity).ok_or_else(|| {
                SettlementError::Validation(format!(
                    "line total for product {} overflows",
                    line.product_id
                ))
            })?;
            lines.push(SettlementLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price,
                line_total,
            });
        }

        let record = SettlementRecord {
            id: SettlementId::new(),
            appointment_id: id,
            client_id: appointment.client_id,
            breakdown: request.breakdown,
            payment_method: request.payment_method,
            membership_credit_used: membership_grant_id.is_some(),
            membership_grant_id,
            lines,
            settled_at: now,
        };
        tx.insert_settlement(&record).await.map_err(|err| match err {
            StoreError::UniqueViolation(_) => SettlementError::AlreadySettled(id),
            other => SettlementError::Store(other),
        })?;
        tx.update_appointment(&appointment).await?;

        let total = record.breakdown.total;
        if total > Money::ZERO {
            tx.insert_financial_entry(&FinancialEntry {
                id: FinancialEntryId::new(),
                settlement_id: record.id,
                appointment_id: id,
                client_id: appointment.client_id,
                amount: total,
                payment_method: record.payment_method,
                entry_date: today,
                description: format!("Settlement {}", appointment.booking_code),
                recorded_at: now,
            })
            .await?;
        }

        tx.record_visit(appointment.client_id, total, today).await?;

        Ok(Settled {
            appointment,
            record,
        })
    }
}

/// Take one credit from the first eligible grant that still has one at
/// write time.
async fn consume_one_credit(
    tx: &mut dyn StoreTransaction,
    appointment: &Appointment,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<GrantId, SettlementError> {
    let candidates = tx.credit_candidates(appointment.client_id).await?;
    for grant in eligible_grants(candidates, appointment.service_id, today) {
        if let Some(consumed) = tx.consume_credit(grant.id).await? {
            tx.record_credit_usage(&CreditUsage {
                grant_id: consumed.id,
                appointment_id: appointment.id,
                used_at: now,
            })
            .await?;
            tracing::debug!(
                grant_id = %consumed.id,
                remaining = consumed.remaining(),
                "Membership credit consumed"
            );
            return Ok(consumed.id);
        }
    }
    Err(SettlementError::NoEligibleCredit(appointment.client_id))
}
