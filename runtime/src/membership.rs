//! Membership grant administration.
//!
//! Credits are only ever consumed by settlement; this module creates and
//! cancels grants.

use crate::{EngineEnvironment, abandon};
use chairbook_core::error::MembershipError;
use chairbook_core::types::{ClientId, GrantId, GrantStatus, MembershipGrant, MembershipTypeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Request to give a client a pack of credits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateGrant {
    /// Holder
    pub client_id: ClientId,
    /// Plan
    pub membership_type_id: MembershipTypeId,
    /// Credits in the pack
    pub total_credits: u32,
    /// Last day the credits can be used
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
}

/// Grant administration.
#[derive(Clone)]
pub struct MembershipService {
    env: EngineEnvironment,
}

impl MembershipService {
    /// Create the service
    #[must_use]
    pub const fn new(env: EngineEnvironment) -> Self {
        Self { env }
    }

    /// Create an `active` grant.
    ///
    /// # Errors
    ///
    /// - [`MembershipError::Validation`] for zero credits or an expiry in the past
    /// - [`MembershipError::NotFound`] for an unknown client or plan
    pub async fn activate_grant(
        &self,
        request: ActivateGrant,
    ) -> Result<MembershipGrant, MembershipError> {
        if request.total_credits == 0 {
            return Err(MembershipError::Validation(
                "a grant needs at least one credit".to_string(),
            ));
        }
        let today = self.env.local_now().date();
        if request.expires_on.is_some_and(|last_day| last_day < today) {
            return Err(MembershipError::Validation(
                "expiration date is in the past".to_string(),
            ));
        }

        if self.env.store.client(request.client_id).await?.is_none() {
            return Err(MembershipError::NotFound {
                entity: "client",
                id: request.client_id.to_string(),
            });
        }
        if self
            .env
            .store
            .membership_type(request.membership_type_id)
            .await?
            .is_none()
        {
            return Err(MembershipError::NotFound {
                entity: "membership type",
                id: request.membership_type_id.to_string(),
            });
        }

        let grant = MembershipGrant {
            id: GrantId::new(),
            client_id: request.client_id,
            membership_type_id: request.membership_type_id,
            total_credits: request.total_credits,
            used_credits: 0,
            status: GrantStatus::Active,
            expires_on: request.expires_on,
            activated_at: self.env.clock.now(),
        };

        let mut tx = self.env.store.begin().await?;
        if let Err(err) = tx.insert_grant(&grant).await {
            abandon(tx).await;
            return Err(err.into());
        }
        tx.commit().await?;

        tracing::info!(
            grant_id = %grant.id,
            client_id = %grant.client_id,
            credits = grant.total_credits,
            "Membership grant activated"
        );
        Ok(grant)
    }

    /// Cancel an `active` grant. Remaining credits are forfeited.
    ///
    /// # Errors
    ///
    /// - [`MembershipError::NotFound`] for an unknown grant
    /// - [`MembershipError::InvalidTransition`] if it is not `active`
    pub async fn cancel_grant(&self, id: GrantId) -> Result<MembershipGrant, MembershipError> {
        let mut tx = self.env.store.begin().await?;
        let grant = match tx.grant_for_update(id).await {
            Ok(Some(grant)) => grant,
            Ok(None) => {
                abandon(tx).await;
                return Err(MembershipError::NotFound {
                    entity: "grant",
                    id: id.to_string(),
                });
            }
            Err(err) => {
                abandon(tx).await;
                return Err(err.into());
            }
        };

        if grant.status != GrantStatus::Active {
            abandon(tx).await;
            return Err(MembershipError::InvalidTransition {
                from: grant.status,
                action: "cancelled",
            });
        }

        if let Err(err) = tx.set_grant_status(id, GrantStatus::Cancelled).await {
            abandon(tx).await;
            return Err(err.into());
        }
        tx.commit().await?;

        tracing::info!(grant_id = %id, forfeited = grant.remaining(), "Membership grant cancelled");
        Ok(MembershipGrant {
            status: GrantStatus::Cancelled,
            ..grant
        })
    }
}
