use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, ProjectId, Resource, impl_uuid_id};

use crate::order::OrderId;

/// Contract identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(Uuid);

impl_uuid_id!(ContractId, "ContractId");

/// Contract record backing an order signature.
///
/// Signature cryptography is an opaque external service; this row only
/// tracks whether that service reported the contract signed. Unsigned drafts
/// may be hard-deleted; a signed contract stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub project_id: ProjectId,
    pub order_id: OrderId,
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn new(
        id: ContractId,
        project_id: ProjectId,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            order_id,
            signed: false,
            signed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Callback from the signing service.
    pub fn mark_signed(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.signed {
            return Err(DomainError::invalid_transition("contract", "signed", "signed"));
        }

        self.signed = true;
        self.signed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

impl Resource for Contract {
    const RESOURCE_TYPE: &'static str = "contract";
    const HARD_DELETE: bool = true;

    fn resource_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn project_id(&self) -> ProjectId {
        self.project_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
