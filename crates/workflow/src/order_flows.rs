//! Order-side transitions: contracts, signature, budget-gated release, the
//! delivery chain, cancellation.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use procura_auth::TenantScope;
use procura_budget::BudgetSnapshot;
use procura_core::{DomainError, DomainResult};
use procura_events::EventPublisher;
use procura_orders::{
    Contract, ContractId, Order, OrderEvent, OrderId,
    order::{
        OrderCancelled, OrderCompleted, OrderDelivered, OrderDeliveryStarted, OrderReleased,
        OrderSigned,
    },
};
use procura_store::{ScopedStore, Versioned};
use procura_tendering::Rfq;

use crate::engine::WorkflowEngine;

impl<S, P> WorkflowEngine<S, P>
where
    S: ScopedStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    /// Create the contract record an order's signature will be captured on.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn create_contract(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Contract> {
        Self::require_buyer(scope)?;

        // The order must exist in this scope.
        self.repos
            .orders
            .get_by_id(scope, *order_id.as_uuid(), false)?;

        let contract = Contract::new(ContractId::new(), scope.project_id(), order_id, now);
        self.repos.contracts.create(scope, &contract)
    }

    /// Callback from the external signing service.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), contract_id = %contract_id), err)]
    pub fn mark_contract_signed(
        &self,
        scope: &TenantScope,
        contract_id: ContractId,
        now: DateTime<Utc>,
    ) -> DomainResult<Contract> {
        let current = self
            .repos
            .contracts
            .get_versioned(scope, *contract_id.as_uuid())?;
        let mut contract = current.record.clone();
        contract.mark_signed(now)?;

        self.store
            .apply(scope, vec![self.repos.contracts.stage_update(&current, &contract)?])?;
        Ok(contract)
    }

    /// `pending_signature -> signed`. When the order requires a contract, a
    /// signed contract row for it must exist.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn sign_order(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.orders.get_versioned(scope, *order_id.as_uuid())?;

        let contract = self
            .repos
            .contracts
            .list(
                scope,
                &Self::unpaged()
                    .with_filter("order_id", json!(order_id))
                    .with_filter("signed", json!(true)),
            )?
            .into_iter()
            .next();

        let mut order = current.record.clone();
        order.sign(contract.as_ref(), now)?;

        let batch = vec![self.repos.orders.stage_update(&current, &order)?];
        let event = OrderEvent::OrderSigned(OrderSigned {
            order_id,
            rfq_id: order.rfq_id(),
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }

    /// `signed -> released`, gated by the budget ledger.
    ///
    /// Committed and actual totals are read in the same transaction scope as
    /// the write; the batch CASes the project budget row, so two concurrent
    /// releases validating against the same remaining figure cannot both
    /// commit; the loser retries against fresh totals.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn release_order(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.orders.get_versioned(scope, *order_id.as_uuid())?;
        let project = self
            .repos
            .projects
            .get_versioned(scope, *scope.project_id().as_uuid())?;

        let orders = self.repos.orders.list(scope, &Self::unpaged())?;
        let committed: i64 = orders
            .iter()
            .filter(|o| o.id() != order_id && o.counts_as_committed())
            .map(Order::total_amount)
            .sum();

        let paid_invoices = self.repos.invoices.list(
            scope,
            &Self::unpaged().with_filter("status", json!("paid")),
        )?;
        let actual_spend: i64 = paid_invoices.iter().map(|i| i.total_amount).sum();

        let snapshot = BudgetSnapshot::new(
            project.record.planned_budget,
            project.record.budget_enforced,
            committed,
            actual_spend,
        );

        // Touching the project row serializes budget validation across
        // concurrent releases.
        let mut batch = vec![self.repos.projects.stage_update(&project, &project.record)?];

        match snapshot.validate(current.record.total_amount(), None) {
            Ok(()) => {}
            Err(DomainError::BudgetExceeded { remaining }) => {
                let shortfall = (current.record.total_amount() as i128 - remaining as i128)
                    .clamp(0, i64::MAX as i128) as i64;

                let approved = self.repos.exceptions.list_versioned(
                    scope,
                    &Self::unpaged().with_filter("status", json!("approved")),
                )?;
                let chosen = approved.into_iter().find(|e| {
                    e.record.usable_for(order_id) && e.record.covers(shortfall)
                });

                match chosen {
                    Some(exception) => {
                        let mut bound = exception.record.clone();
                        bound.attach_to_order(order_id, now)?;
                        batch.push(self.repos.exceptions.stage_update(&exception, &bound)?);
                    }
                    None => return Err(DomainError::budget_exceeded(remaining)),
                }
            }
            Err(other) => return Err(other),
        }

        let mut order = current.record.clone();
        order.release(now)?;
        batch.push(self.repos.orders.stage_update(&current, &order)?);

        let event = OrderEvent::OrderReleased(OrderReleased {
            order_id,
            rfq_id: order.rfq_id(),
            project_id: scope.project_id(),
            total_amount: order.total_amount(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }

    /// `released -> in_delivery`.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn start_delivery(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        let correlation_id = Uuid::now_v7();

        let current = self.repos.orders.get_versioned(scope, *order_id.as_uuid())?;
        let mut order = current.record.clone();
        order.start_delivery(now)?;

        let batch = vec![self.repos.orders.stage_update(&current, &order)?];
        let event = OrderEvent::OrderDeliveryStarted(OrderDeliveryStarted {
            order_id,
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }

    /// `in_delivery -> delivered`.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn record_delivery(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        let correlation_id = Uuid::now_v7();

        let current = self.repos.orders.get_versioned(scope, *order_id.as_uuid())?;
        let mut order = current.record.clone();
        order.record_delivery(now)?;

        let batch = vec![self.repos.orders.stage_update(&current, &order)?];
        let event = OrderEvent::OrderDelivered(OrderDelivered {
            order_id,
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }

    /// `delivered -> completed`; the owning RFQ moves `awarded -> closed`
    /// in the same transaction.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn complete_order(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.orders.get_versioned(scope, *order_id.as_uuid())?;
        let mut order = current.record.clone();
        order.complete(now)?;

        let rfq_current: Versioned<Rfq> = self
            .repos
            .rfqs
            .get_versioned(scope, *order.rfq_id().as_uuid())?;
        let mut rfq = rfq_current.record.clone();
        rfq.close(now)?;

        let batch = vec![
            self.repos.orders.stage_update(&current, &order)?,
            self.repos.rfqs.stage_update(&rfq_current, &rfq)?,
        ];
        let event = OrderEvent::OrderCompleted(OrderCompleted {
            order_id,
            rfq_id: order.rfq_id(),
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }

    /// Any pre-release state -> `cancelled`.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn cancel_order(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.orders.get_versioned(scope, *order_id.as_uuid())?;
        let mut order = current.record.clone();
        order.cancel(now)?;

        let batch = vec![self.repos.orders.stage_update(&current, &order)?];
        let event = OrderEvent::OrderCancelled(OrderCancelled {
            order_id,
            rfq_id: order.rfq_id(),
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }
}
