use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, ProjectId, Resource, impl_uuid_id};
use procura_events::DomainEvent;
use procura_tendering::{QuoteId, RfqId};

use crate::contract::{Contract, ContractId};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl_uuid_id!(OrderId, "OrderId");

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingSignature,
    Signed,
    Released,
    InDelivery,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingSignature => "pending_signature",
            Self::Signed => "signed",
            Self::Released => "released",
            Self::InDelivery => "in_delivery",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order created from exactly one accepted quote.
///
/// `accepted_quote_id` is set at construction and has no mutator: it is
/// immutable for the lifetime of the order. Cancellation is only possible
/// before release; once goods are moving the order can only run forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    project_id: ProjectId,
    rfq_id: RfqId,
    accepted_quote_id: QuoteId,
    status: OrderStatus,
    /// Total in the smallest currency unit (e.g., cents).
    total_amount: i64,
    contract_id: Option<ContractId>,
    requires_contract: bool,
    signed_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
    delivery_started_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_award(
        id: OrderId,
        project_id: ProjectId,
        rfq_id: RfqId,
        accepted_quote_id: QuoteId,
        total_amount: i64,
        requires_contract: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if total_amount <= 0 {
            return Err(DomainError::validation("order total_amount must be positive"));
        }

        Ok(Self {
            id,
            project_id,
            rfq_id,
            accepted_quote_id,
            status: OrderStatus::PendingSignature,
            total_amount,
            contract_id: None,
            requires_contract,
            signed_at: None,
            released_at: None,
            delivery_started_at: None,
            delivered_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn rfq_id(&self) -> RfqId {
        self.rfq_id
    }

    pub fn accepted_quote_id(&self) -> QuoteId {
        self.accepted_quote_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn contract_id(&self) -> Option<ContractId> {
        self.contract_id
    }

    pub fn requires_contract(&self) -> bool {
        self.requires_contract
    }

    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        self.signed_at
    }

    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.released_at
    }

    /// Counts against the project's committed budget.
    pub fn counts_as_committed(&self) -> bool {
        self.status != OrderStatus::Cancelled
    }

    /// Whether the bidder-identity reveal point has been reached.
    ///
    /// Reveal is keyed on having *reached* `signed`, so a post-signature
    /// cancellation does not re-mask identities that were already legitimately
    /// visible.
    pub fn identity_reveal_reached(&self) -> bool {
        self.signed_at.is_some()
    }

    /// Release has happened (or is past); cancellation is no longer possible.
    pub fn reached_release(&self) -> bool {
        self.released_at.is_some()
    }

    fn invalid(&self, to: OrderStatus) -> DomainError {
        DomainError::invalid_transition("order", self.status, to)
    }

    /// `pending_signature -> signed`.
    ///
    /// When `requires_contract` is set, a signed contract for this order must
    /// be presented; the order cannot leave `pending_signature` without it.
    pub fn sign(&mut self, contract: Option<&Contract>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::PendingSignature {
            return Err(self.invalid(OrderStatus::Signed));
        }

        if self.requires_contract {
            let contract = contract.ok_or_else(|| {
                DomainError::invalid_transition(
                    "order",
                    "pending_signature (contract required, none signed)",
                    OrderStatus::Signed,
                )
            })?;
            if contract.order_id != self.id || !contract.signed {
                return Err(DomainError::invalid_transition(
                    "order",
                    "pending_signature (contract required, none signed)",
                    OrderStatus::Signed,
                ));
            }
            self.contract_id = Some(contract.id);
        } else if let Some(contract) = contract {
            if contract.order_id == self.id && contract.signed {
                self.contract_id = Some(contract.id);
            }
        }

        self.status = OrderStatus::Signed;
        self.signed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `signed -> released`. Budget validation happens in the same
    /// transaction, before this is called.
    pub fn release(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Signed {
            return Err(self.invalid(OrderStatus::Released));
        }

        self.status = OrderStatus::Released;
        self.released_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `released -> in_delivery`.
    pub fn start_delivery(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Released {
            return Err(self.invalid(OrderStatus::InDelivery));
        }

        self.status = OrderStatus::InDelivery;
        self.delivery_started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `in_delivery -> delivered`.
    pub fn record_delivery(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::InDelivery {
            return Err(self.invalid(OrderStatus::Delivered));
        }

        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `delivered -> completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Delivered {
            return Err(self.invalid(OrderStatus::Completed));
        }

        self.status = OrderStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Any pre-release state -> `cancelled`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.status, OrderStatus::PendingSignature | OrderStatus::Signed) {
            return Err(self.invalid(OrderStatus::Cancelled));
        }

        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

impl Resource for Order {
    const RESOURCE_TYPE: &'static str = "order";

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

/// Event: OrderSigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSigned {
    pub order_id: OrderId,
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReleased {
    pub order_id: OrderId,
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub total_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDeliveryStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeliveryStarted {
    pub order_id: OrderId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub order_id: OrderId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCompleted. Also closes the owning RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderSigned(OrderSigned),
    OrderReleased(OrderReleased),
    OrderDeliveryStarted(OrderDeliveryStarted),
    OrderDelivered(OrderDelivered),
    OrderCompleted(OrderCompleted),
    OrderCancelled(OrderCancelled),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderSigned(_) => "order.signed",
            OrderEvent::OrderReleased(_) => "order.released",
            OrderEvent::OrderDeliveryStarted(_) => "order.delivery_started",
            OrderEvent::OrderDelivered(_) => "order.delivered",
            OrderEvent::OrderCompleted(_) => "order.completed",
            OrderEvent::OrderCancelled(_) => "order.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderSigned(e) => e.occurred_at,
            OrderEvent::OrderReleased(e) => e.occurred_at,
            OrderEvent::OrderDeliveryStarted(e) => e.occurred_at,
            OrderEvent::OrderDelivered(e) => e.occurred_at,
            OrderEvent::OrderCompleted(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order(requires_contract: bool) -> Order {
        Order::from_award(
            OrderId::new(),
            ProjectId::new(),
            RfqId::new(),
            QuoteId::new(),
            500_000,
            requires_contract,
            Utc::now(),
        )
        .unwrap()
    }

    fn signed_contract(order: &Order) -> Contract {
        let mut contract = Contract::new(
            ContractId::new(),
            order.project_id,
            order.id(),
            Utc::now(),
        );
        contract.mark_signed(Utc::now()).unwrap();
        contract
    }

    #[test]
    fn sign_without_required_contract_is_blocked() {
        let now = Utc::now();
        let mut order = test_order(true);

        let err = order.sign(None, now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
        assert_eq!(order.status(), OrderStatus::PendingSignature);
    }

    #[test]
    fn sign_with_unsigned_contract_is_blocked() {
        let now = Utc::now();
        let mut order = test_order(true);
        let contract = Contract::new(
            ContractId::new(),
            order.project_id,
            order.id(),
            now,
        );

        let err = order.sign(Some(&contract), now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[test]
    fn sign_records_contract_and_reveal_point() {
        let now = Utc::now();
        let mut order = test_order(true);
        let contract = signed_contract(&order);

        assert!(!order.identity_reveal_reached());
        order.sign(Some(&contract), now).unwrap();

        assert_eq!(order.status(), OrderStatus::Signed);
        assert_eq!(order.contract_id(), Some(contract.id));
        assert!(order.identity_reveal_reached());
    }

    #[test]
    fn sign_without_contract_when_not_required() {
        let now = Utc::now();
        let mut order = test_order(false);
        order.sign(None, now).unwrap();
        assert_eq!(order.status(), OrderStatus::Signed);
        assert_eq!(order.contract_id(), None);
    }

    #[test]
    fn delivery_chain_is_strictly_sequential() {
        let now = Utc::now();
        let mut order = test_order(false);
        order.sign(None, now).unwrap();
        order.release(now).unwrap();

        // Cannot skip straight to delivered.
        assert!(matches!(
            order.record_delivery(now),
            Err(DomainError::InvalidStateTransition(_))
        ));

        order.start_delivery(now).unwrap();
        order.record_delivery(now).unwrap();
        order.complete(now).unwrap();
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(order.status().is_terminal());
    }

    #[test]
    fn release_requires_signature() {
        let now = Utc::now();
        let mut order = test_order(false);
        let err = order.release(now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[test]
    fn cancel_only_before_release() {
        let now = Utc::now();

        let mut order = test_order(false);
        order.cancel(now).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(!order.counts_as_committed());

        let mut order = test_order(false);
        order.sign(None, now).unwrap();
        order.release(now).unwrap();
        let err = order.cancel(now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[test]
    fn reveal_point_survives_post_signature_cancel() {
        let now = Utc::now();
        let mut order = test_order(false);
        order.sign(None, now).unwrap();
        order.cancel(now).unwrap();

        assert!(order.identity_reveal_reached());
    }
}
