use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, ProjectId, Resource, UserId, impl_uuid_id};
use procura_events::DomainEvent;
use procura_orders::OrderId;

/// Budget exception identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetExceptionId(Uuid);

impl_uuid_id!(BudgetExceptionId, "BudgetExceptionId");

/// Budget exception status: one transition out of `pending`, no revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetExceptionStatus {
    Pending,
    Approved,
    Rejected,
}

impl BudgetExceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for BudgetExceptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to exceed a project's remaining budget.
///
/// Created by a manager-role actor, decided exactly once by an approver.
/// Once it has released an order it stays bound to that order and cannot be
/// reused for another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetException {
    id: BudgetExceptionId,
    project_id: ProjectId,
    order_id: Option<OrderId>,
    requested_amount: i64,
    approved_amount: Option<i64>,
    status: BudgetExceptionStatus,
    requested_by: UserId,
    decided_by: Option<UserId>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl BudgetException {
    pub fn request(
        id: BudgetExceptionId,
        project_id: ProjectId,
        order_id: Option<OrderId>,
        requested_amount: i64,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if requested_amount <= 0 {
            return Err(DomainError::validation(
                "requested_amount must be positive",
            ));
        }

        Ok(Self {
            id,
            project_id,
            order_id,
            requested_amount,
            approved_amount: None,
            status: BudgetExceptionStatus::Pending,
            requested_by,
            decided_by: None,
            created_at: now,
            decided_at: None,
            updated_at: now,
        })
    }

    pub fn id(&self) -> BudgetExceptionId {
        self.id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn requested_amount(&self) -> i64 {
        self.requested_amount
    }

    pub fn approved_amount(&self) -> Option<i64> {
        self.approved_amount
    }

    pub fn status(&self) -> BudgetExceptionStatus {
        self.status
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn decided_by(&self) -> Option<UserId> {
        self.decided_by
    }

    fn ensure_pending(&self, to: BudgetExceptionStatus) -> DomainResult<()> {
        if self.status != BudgetExceptionStatus::Pending {
            return Err(DomainError::invalid_transition(
                "budget_exception",
                self.status,
                to,
            ));
        }
        Ok(())
    }

    /// `pending -> approved`. The approved amount may be below the request
    /// (partial approval).
    pub fn approve(
        &mut self,
        approved_amount: i64,
        decided_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_pending(BudgetExceptionStatus::Approved)?;
        if approved_amount <= 0 {
            return Err(DomainError::validation("approved_amount must be positive"));
        }

        self.status = BudgetExceptionStatus::Approved;
        self.approved_amount = Some(approved_amount);
        self.decided_by = Some(decided_by);
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `pending -> rejected`.
    pub fn reject(&mut self, decided_by: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending(BudgetExceptionStatus::Rejected)?;

        self.status = BudgetExceptionStatus::Rejected;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Whether this exception unblocks a release short by `shortfall`.
    pub fn covers(&self, shortfall: i64) -> bool {
        self.status == BudgetExceptionStatus::Approved
            && self.approved_amount.is_some_and(|a| a >= shortfall)
    }

    /// Usable for the given order: approved, and either unbound or already
    /// bound to that same order.
    pub fn usable_for(&self, order_id: OrderId) -> bool {
        self.status == BudgetExceptionStatus::Approved
            && (self.order_id.is_none() || self.order_id == Some(order_id))
    }

    /// Bind this exception to the order it released.
    pub fn attach_to_order(&mut self, order_id: OrderId, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != BudgetExceptionStatus::Approved {
            return Err(DomainError::invalid_transition(
                "budget_exception",
                self.status,
                "consumed",
            ));
        }
        if let Some(existing) = self.order_id {
            if existing != order_id {
                return Err(DomainError::validation(
                    "budget exception is already bound to another order",
                ));
            }
        }

        self.order_id = Some(order_id);
        self.updated_at = now;
        Ok(())
    }
}

impl Resource for BudgetException {
    const RESOURCE_TYPE: &'static str = "budget_exception";

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

/// Event: BudgetExceptionRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetExceptionRequested {
    pub exception_id: BudgetExceptionId,
    pub project_id: ProjectId,
    pub requested_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetExceptionApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetExceptionApproved {
    pub exception_id: BudgetExceptionId,
    pub project_id: ProjectId,
    pub approved_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetExceptionRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetExceptionRejected {
    pub exception_id: BudgetExceptionId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionEvent {
    BudgetExceptionRequested(BudgetExceptionRequested),
    BudgetExceptionApproved(BudgetExceptionApproved),
    BudgetExceptionRejected(BudgetExceptionRejected),
}

impl DomainEvent for ExceptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExceptionEvent::BudgetExceptionRequested(_) => "budget.exception_requested",
            ExceptionEvent::BudgetExceptionApproved(_) => "budget.exception_approved",
            ExceptionEvent::BudgetExceptionRejected(_) => "budget.exception_rejected",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExceptionEvent::BudgetExceptionRequested(e) => e.occurred_at,
            ExceptionEvent::BudgetExceptionApproved(e) => e.occurred_at,
            ExceptionEvent::BudgetExceptionRejected(e) => e.occurred_at,
        }
    }
}
