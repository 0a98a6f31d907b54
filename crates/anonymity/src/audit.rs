use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{ProjectId, Resource, UserId, impl_uuid_id};
use procura_tendering::QuoteId;

/// Reveal audit record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevealAuditId(Uuid);

impl_uuid_id!(RevealAuditId, "RevealAuditId");

/// Append-only record of one identity reveal.
///
/// Exactly one row per successful `reveal()` call. Never deleted, soft or
/// hard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRevealAudit {
    pub id: RevealAuditId,
    pub project_id: ProjectId,
    pub quote_id: QuoteId,
    pub actor_id: UserId,
    pub revealed_at: DateTime<Utc>,
}

impl IdentityRevealAudit {
    pub fn record(
        project_id: ProjectId,
        quote_id: QuoteId,
        actor_id: UserId,
        revealed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RevealAuditId::new(),
            project_id,
            quote_id,
            actor_id,
            revealed_at,
        }
    }
}

impl Resource for IdentityRevealAudit {
    const RESOURCE_TYPE: &'static str = "identity_reveal_audit";

    fn resource_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn project_id(&self) -> ProjectId {
        self.project_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.revealed_at
    }
}
