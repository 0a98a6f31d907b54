//! Budget exception workflow and invoice spend tracking.

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use procura_auth::TenantScope;
use procura_budget::{
    BudgetException, BudgetExceptionId, ExceptionEvent, Invoice, InvoiceEvent, InvoiceId,
    exception::{BudgetExceptionApproved, BudgetExceptionRejected, BudgetExceptionRequested},
    invoice::InvoicePaid,
};
use procura_core::{DomainError, DomainResult};
use procura_events::EventPublisher;
use procura_orders::OrderId;
use procura_store::ScopedStore;

use crate::engine::WorkflowEngine;

/// Payload for a budget exception request.
#[derive(Debug, Clone)]
pub struct RequestBudgetException {
    /// Order the exception should unblock, when already known.
    pub order_id: Option<OrderId>,
    pub requested_amount: i64,
}

impl<S, P> WorkflowEngine<S, P>
where
    S: ScopedStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    /// Manager-role request to exceed the project's remaining budget.
    #[instrument(skip_all, fields(project_id = %scope.project_id()), err)]
    pub fn request_budget_exception(
        &self,
        scope: &TenantScope,
        input: RequestBudgetException,
        now: DateTime<Utc>,
    ) -> DomainResult<BudgetException> {
        Self::require_manager(scope)?;
        let correlation_id = Uuid::now_v7();

        if let Some(order_id) = input.order_id {
            self.repos
                .orders
                .get_by_id(scope, *order_id.as_uuid(), false)?;
        }

        let exception = BudgetException::request(
            BudgetExceptionId::new(),
            scope.project_id(),
            input.order_id,
            input.requested_amount,
            scope.actor_id(),
            now,
        )?;

        let batch = vec![self.repos.exceptions.stage_create(&exception)?];
        let event = ExceptionEvent::BudgetExceptionRequested(BudgetExceptionRequested {
            exception_id: exception.id(),
            project_id: scope.project_id(),
            requested_amount: exception.requested_amount(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(exception)
    }

    /// Approver decision. Approving your own request is not allowed.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), exception_id = %exception_id), err)]
    pub fn approve_budget_exception(
        &self,
        scope: &TenantScope,
        exception_id: BudgetExceptionId,
        approved_amount: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<BudgetException> {
        Self::require_approver(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self
            .repos
            .exceptions
            .get_versioned(scope, *exception_id.as_uuid())?;
        if current.record.requested_by() == scope.actor_id() {
            return Err(DomainError::Unauthorized);
        }

        let mut exception = current.record.clone();
        exception.approve(approved_amount, scope.actor_id(), now)?;

        let batch = vec![self.repos.exceptions.stage_update(&current, &exception)?];
        let event = ExceptionEvent::BudgetExceptionApproved(BudgetExceptionApproved {
            exception_id,
            project_id: scope.project_id(),
            approved_amount,
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(exception)
    }

    /// Approver rejection.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), exception_id = %exception_id), err)]
    pub fn reject_budget_exception(
        &self,
        scope: &TenantScope,
        exception_id: BudgetExceptionId,
        now: DateTime<Utc>,
    ) -> DomainResult<BudgetException> {
        Self::require_approver(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self
            .repos
            .exceptions
            .get_versioned(scope, *exception_id.as_uuid())?;
        if current.record.requested_by() == scope.actor_id() {
            return Err(DomainError::Unauthorized);
        }

        let mut exception = current.record.clone();
        exception.reject(scope.actor_id(), now)?;

        let batch = vec![self.repos.exceptions.stage_update(&current, &exception)?];
        let event = ExceptionEvent::BudgetExceptionRejected(BudgetExceptionRejected {
            exception_id,
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(exception)
    }

    /// Record a supplier invoice against a released order.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), order_id = %order_id), err)]
    pub fn issue_invoice(
        &self,
        scope: &TenantScope,
        order_id: OrderId,
        total_amount: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Invoice> {
        Self::require_buyer(scope)?;

        let order = self
            .repos
            .orders
            .get_by_id(scope, *order_id.as_uuid(), false)?;
        if !order.reached_release() {
            return Err(DomainError::validation(
                "invoices can only be recorded against released orders",
            ));
        }

        let invoice = Invoice::issue(
            InvoiceId::new(),
            scope.project_id(),
            order_id,
            total_amount,
            now,
        )?;
        self.repos.invoices.create(scope, &invoice)
    }

    /// Payment confirmation from the settlement side; from here the amount
    /// counts as actual spend.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), invoice_id = %invoice_id), err)]
    pub fn mark_invoice_paid(
        &self,
        scope: &TenantScope,
        invoice_id: InvoiceId,
        now: DateTime<Utc>,
    ) -> DomainResult<Invoice> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self
            .repos
            .invoices
            .get_versioned(scope, *invoice_id.as_uuid())?;
        let mut invoice = current.record.clone();
        invoice.mark_paid(now)?;

        let batch = vec![self.repos.invoices.stage_update(&current, &invoice)?];
        let event = InvoiceEvent::InvoicePaid(InvoicePaid {
            invoice_id,
            order_id: invoice.order_id,
            project_id: scope.project_id(),
            total_amount: invoice.total_amount,
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(invoice)
    }
}
