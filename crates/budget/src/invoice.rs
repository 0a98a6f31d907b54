use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, ProjectId, Resource, impl_uuid_id};
use procura_events::DomainEvent;
use procura_orders::OrderId;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(Uuid);

impl_uuid_id!(InvoiceId, "InvoiceId");

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Issued,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier invoice against a released order.
///
/// Paid invoices are what the ledger counts as actual spend. Mistaken rows
/// are soft-deleted, never erased: spend history is auditable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub project_id: ProjectId,
    pub order_id: OrderId,
    /// Total in the smallest currency unit (e.g., cents).
    pub total_amount: i64,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn issue(
        id: InvoiceId,
        project_id: ProjectId,
        order_id: OrderId,
        total_amount: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if total_amount <= 0 {
            return Err(DomainError::validation("invoice total_amount must be positive"));
        }

        Ok(Self {
            id,
            project_id,
            order_id,
            total_amount,
            status: InvoiceStatus::Issued,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `issued -> paid`. From here the amount counts as actual spend.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != InvoiceStatus::Issued {
            return Err(DomainError::invalid_transition(
                "invoice",
                self.status,
                InvoiceStatus::Paid,
            ));
        }

        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `issued -> void`.
    pub fn void(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != InvoiceStatus::Issued {
            return Err(DomainError::invalid_transition(
                "invoice",
                self.status,
                InvoiceStatus::Void,
            ));
        }

        self.status = InvoiceStatus::Void;
        self.updated_at = now;
        Ok(())
    }

    pub fn counts_as_spend(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

impl Resource for Invoice {
    const RESOURCE_TYPE: &'static str = "invoice";
    const SOFT_DELETE: bool = true;

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

/// Event: InvoicePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice_id: InvoiceId,
    pub order_id: OrderId,
    pub project_id: ProjectId,
    pub total_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoicePaid(InvoicePaid),
}

impl DomainEvent for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoicePaid(_) => "invoice.paid",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
        }
    }
}
