//! Pure settlement rules: request validation and credit selection.

use crate::error::SettlementError;
use crate::types::{CreditCandidate, MembershipGrant, ServiceId, SettlementRequest};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Reject malformed settlement requests before any write.
///
/// # Errors
///
/// Returns [`SettlementError::Validation`] when the cost breakdown is
/// inconsistent, a quantity is zero, a product repeats, or there are more
/// than `max_lines` product lines.
pub fn validate_request(
    request: &SettlementRequest,
    max_lines: usize,
) -> Result<(), SettlementError> {
    request
        .breakdown
        .validate()
        .map_err(SettlementError::Validation)?;

    if request.product_lines.len() > max_lines {
        return Err(SettlementError::Validation(format!(
            "at most {max_lines} product lines per settlement"
        )));
    }

    let mut seen = HashSet::new();
    for line in &request.product_lines {
        if line.quantity == 0 {
            return Err(SettlementError::Validation(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }
        if !seen.insert(line.product_id) {
            return Err(SettlementError::Validation(format!(
                "product {} appears more than once",
                line.product_id
            )));
        }
    }

    Ok(())
}

/// Grants that may pay for `service_id` on `today`, in consumption order.
///
/// A grant qualifies when it is active, has a remaining credit, has not
/// passed its expiration date, and its plan covers the service. Grants
/// expiring soonest come first (open-ended ones last), then the oldest
/// activation.
#[must_use]
pub fn eligible_grants(
    candidates: Vec<CreditCandidate>,
    service_id: ServiceId,
    today: NaiveDate,
) -> Vec<MembershipGrant> {
    let mut grants: Vec<MembershipGrant> = candidates
        .into_iter()
        .filter(|candidate| {
            candidate.grant.is_usable_on(today) && candidate.membership_type.covers(service_id)
        })
        .map(|candidate| candidate.grant)
        .collect();

    grants.sort_by(|a, b| {
        let a_expiry = a.expires_on.unwrap_or(NaiveDate::MAX);
        let b_expiry = b.expires_on.unwrap_or(NaiveDate::MAX);
        a_expiry
            .cmp(&b_expiry)
            .then(a.activated_at.cmp(&b.activated_at))
    });
    grants
}
