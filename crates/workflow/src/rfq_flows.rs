//! RFQ-side transitions: draft, publish, quote submission, second chance,
//! award, cancel.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use procura_auth::TenantScope;
use procura_core::{Currency, DomainError, DomainResult, OrganizationId};
use procura_events::EventPublisher;
use procura_orders::{Order, OrderId};
use procura_projects::Project;
use procura_store::{ListQuery, ScopedStore};
use procura_tendering::{
    Quote, QuoteDetails, QuoteEvent, QuoteId, Rfq, RfqEvent, RfqId, RfqStatus,
    quote::QuoteSubmitted,
    rfq::{RfqAwarded, RfqCancelled, RfqCreated, RfqPublished, SecondChanceClosed, SecondChanceOpened},
};

use crate::engine::WorkflowEngine;

/// Payload for project creation. The project id comes from the scope: the
/// host allocates it when it establishes the tenant context.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub planned_budget: i64,
    pub currency: Currency,
    pub budget_enforced: bool,
}

/// Payload for RFQ creation.
#[derive(Debug, Clone)]
pub struct CreateRfq {
    pub title: String,
    pub description: Option<String>,
    pub target_suppliers: Vec<OrganizationId>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Payload for quote submission. The supplier organization is taken from
/// the caller's scope, never from the payload.
#[derive(Debug, Clone)]
pub struct SubmitQuote {
    pub total_amount: i64,
    pub details: QuoteDetails,
}

/// Payload for the award transition.
#[derive(Debug, Clone)]
pub struct AwardRfq {
    pub quote_id: QuoteId,
    pub requires_contract: bool,
}

impl<S, P> WorkflowEngine<S, P>
where
    S: ScopedStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    /// Set up the project row for the scope's project.
    #[instrument(skip_all, fields(project_id = %scope.project_id()), err)]
    pub fn create_project(
        &self,
        scope: &TenantScope,
        input: NewProject,
        now: DateTime<Utc>,
    ) -> DomainResult<Project> {
        Self::require_manager(scope)?;

        let project = Project::new(
            scope.project_id(),
            scope.organization_id(),
            input.name,
            input.planned_budget,
            input.currency,
            input.budget_enforced,
            now,
        )?;
        self.repos.projects.create(scope, &project)
    }

    #[instrument(skip_all, fields(project_id = %scope.project_id()), err)]
    pub fn create_rfq(
        &self,
        scope: &TenantScope,
        input: CreateRfq,
        now: DateTime<Utc>,
    ) -> DomainResult<Rfq> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let project = self
            .repos
            .projects
            .get_by_id(scope, *scope.project_id().as_uuid(), false)?;
        if !project.active {
            return Err(DomainError::validation("project is not active"));
        }

        let rfq = Rfq::draft(
            RfqId::new(),
            scope.project_id(),
            input.title,
            input.description,
            input.target_suppliers,
            input.expires_at,
            now,
        )?;

        let batch = vec![self.repos.rfqs.stage_create(&rfq)?];
        let event = RfqEvent::RfqCreated(RfqCreated {
            rfq_id: rfq.id(),
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(rfq)
    }

    #[instrument(skip_all, fields(project_id = %scope.project_id(), rfq_id = %rfq_id), err)]
    pub fn publish_rfq(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
        now: DateTime<Utc>,
    ) -> DomainResult<Rfq> {
        Self::require_buyer(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.rfqs.get_versioned(scope, *rfq_id.as_uuid())?;
        let mut rfq = current.record.clone();
        rfq.publish(now)?;

        let batch = vec![self.repos.rfqs.stage_update(&current, &rfq)?];
        let event = RfqEvent::RfqPublished(RfqPublished {
            rfq_id,
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(rfq)
    }

    /// Submit a quote as the supplier in scope.
    ///
    /// - Initial submissions are open while the RFQ is `published`/`bidding`
    ///   and not expired; the first one moves a published RFQ into
    ///   `bidding` in the same transaction.
    /// - During an open second-chance window, suppliers with a prior quote
    ///   get exactly one revision; the prior quote is superseded atomically.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), rfq_id = %rfq_id), err)]
    pub fn submit_quote(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
        input: SubmitQuote,
        now: DateTime<Utc>,
    ) -> DomainResult<Quote> {
        Self::require_supplier(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.rfqs.get_versioned(scope, *rfq_id.as_uuid())?;
        let supplier = scope.organization_id();

        let existing = self.repos.quotes.list_versioned(
            scope,
            &ListQuery::new()
                .with_filter("rfq_id", json!(rfq_id))
                .with_filter("supplier_org_id", json!(supplier)),
        )?;
        let latest = existing.iter().max_by_key(|v| v.record.revision_no());

        let mut batch = Vec::new();
        let quote = match current.record.status() {
            RfqStatus::Published | RfqStatus::Bidding => {
                if !current.record.accepts_initial_quotes(now) {
                    return Err(DomainError::validation("rfq no longer accepts quotes"));
                }
                if latest.is_some() {
                    return Err(DomainError::validation(
                        "quote already submitted; revisions are only possible during a second-chance window",
                    ));
                }

                let quote = Quote::initial(
                    QuoteId::new(),
                    scope.project_id(),
                    rfq_id,
                    supplier,
                    input.total_amount,
                    input.details,
                    now,
                )?;

                if current.record.status() == RfqStatus::Published {
                    let mut rfq = current.record.clone();
                    rfq.open_bidding(now)?;
                    batch.push(self.repos.rfqs.stage_update(&current, &rfq)?);
                }
                batch.push(self.repos.quotes.stage_create(&quote)?);
                quote
            }
            RfqStatus::SecondChance => {
                if !current.record.second_chance_open(now) {
                    return Err(DomainError::validation("second-chance window has expired"));
                }
                let Some(latest) = latest else {
                    return Err(DomainError::validation(
                        "second-chance bidding is limited to suppliers with a prior quote",
                    ));
                };
                if latest.record.revision_no() > 1 {
                    return Err(DomainError::validation(
                        "second-chance revision slot already used",
                    ));
                }

                let revision = Quote::revision(
                    &latest.record,
                    QuoteId::new(),
                    input.total_amount,
                    input.details,
                    now,
                )?;

                let mut superseded = latest.record.clone();
                superseded.supersede(now)?;

                // CAS the RFQ row so a revision racing the window-expiry
                // transition is decided by commit order, not wall clock.
                batch.push(self.repos.rfqs.stage_update(&current, &current.record)?);
                batch.push(self.repos.quotes.stage_update(latest, &superseded)?);
                batch.push(self.repos.quotes.stage_create(&revision)?);
                revision
            }
            status => {
                return Err(DomainError::invalid_transition(
                    "rfq",
                    status,
                    "quote submission",
                ));
            }
        };

        let event = QuoteEvent::QuoteSubmitted(QuoteSubmitted {
            quote_id: quote.id(),
            rfq_id,
            project_id: scope.project_id(),
            revision_no: quote.revision_no(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(quote)
    }

    /// Open the one-time second-chance window. Procurement managers only.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), rfq_id = %rfq_id), err)]
    pub fn trigger_second_chance(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<Rfq> {
        Self::require_manager(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.rfqs.get_versioned(scope, *rfq_id.as_uuid())?;
        let mut rfq = current.record.clone();
        rfq.open_second_chance(deadline, now)?;

        let batch = vec![self.repos.rfqs.stage_update(&current, &rfq)?];
        let event = RfqEvent::SecondChanceOpened(SecondChanceOpened {
            rfq_id,
            project_id: scope.project_id(),
            deadline,
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(rfq)
    }

    /// Scheduler callback on second-chance deadline expiry; re-enters
    /// normal evaluation.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), rfq_id = %rfq_id), err)]
    pub fn expire_second_chance(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
        now: DateTime<Utc>,
    ) -> DomainResult<Rfq> {
        let correlation_id = Uuid::now_v7();

        let current = self.repos.rfqs.get_versioned(scope, *rfq_id.as_uuid())?;
        let mut rfq = current.record.clone();
        rfq.close_second_chance(now)?;

        let batch = vec![self.repos.rfqs.stage_update(&current, &rfq)?];
        let event = RfqEvent::SecondChanceClosed(SecondChanceClosed {
            rfq_id,
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(rfq)
    }

    /// Award the RFQ to one quote and create the order, in one transaction.
    /// Losing quotes still in `submitted` are declined in the same batch.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), rfq_id = %rfq_id), err)]
    pub fn award_rfq(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
        input: AwardRfq,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        Self::require_manager(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.rfqs.get_versioned(scope, *rfq_id.as_uuid())?;
        let selected = self
            .repos
            .quotes
            .get_versioned(scope, *input.quote_id.as_uuid())?;

        if selected.record.rfq_id() != rfq_id {
            return Err(DomainError::validation(
                "selected quote does not belong to this rfq",
            ));
        }
        if !selected.record.is_acceptable() {
            return Err(DomainError::validation(format!(
                "selected quote is not acceptable (status {})",
                selected.record.status()
            )));
        }

        let mut rfq = current.record.clone();
        rfq.award(now)?;

        let mut accepted = selected.record.clone();
        accepted.accept(now)?;

        let order = Order::from_award(
            OrderId::new(),
            scope.project_id(),
            rfq_id,
            input.quote_id,
            accepted.total_amount(),
            input.requires_contract,
            now,
        )?;

        let mut batch = vec![
            self.repos.rfqs.stage_update(&current, &rfq)?,
            self.repos.quotes.stage_update(&selected, &accepted)?,
            self.repos.orders.stage_create(&order)?,
        ];

        // Losing quotes are declined in the same transaction.
        let losers = self.repos.quotes.list_versioned(
            scope,
            &Self::unpaged()
                .with_filter("rfq_id", json!(rfq_id))
                .with_filter("status", json!("submitted")),
        )?;
        for loser in losers {
            if loser.record.id() == input.quote_id {
                continue;
            }
            let mut declined = loser.record.clone();
            declined.decline(now)?;
            batch.push(self.repos.quotes.stage_update(&loser, &declined)?);
        }

        let event = RfqEvent::RfqAwarded(RfqAwarded {
            rfq_id,
            project_id: scope.project_id(),
            quote_id: *input.quote_id.as_uuid(),
            order_id: *order.id().as_uuid(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(order)
    }

    /// Cancel the RFQ. Blocked once any order of this RFQ was released;
    /// pre-release orders are cancelled in the same transaction.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), rfq_id = %rfq_id), err)]
    pub fn cancel_rfq(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
        now: DateTime<Utc>,
    ) -> DomainResult<Rfq> {
        Self::require_manager(scope)?;
        let correlation_id = Uuid::now_v7();

        let current = self.repos.rfqs.get_versioned(scope, *rfq_id.as_uuid())?;

        let orders = self
            .repos
            .orders
            .list_versioned(scope, &Self::unpaged().with_filter("rfq_id", json!(rfq_id)))?;
        if orders.iter().any(|o| o.record.reached_release()) {
            return Err(DomainError::InvalidStateTransition(
                "rfq: cannot cancel after an order has been released".to_string(),
            ));
        }

        let mut rfq = current.record.clone();
        rfq.cancel(now)?;

        let mut batch = vec![self.repos.rfqs.stage_update(&current, &rfq)?];
        for order in &orders {
            if order.record.status().is_terminal() {
                continue;
            }
            let mut cancelled = order.record.clone();
            cancelled.cancel(now)?;
            batch.push(self.repos.orders.stage_update(order, &cancelled)?);
        }

        let event = RfqEvent::RfqCancelled(RfqCancelled {
            rfq_id,
            project_id: scope.project_id(),
            occurred_at: now,
        });
        self.commit(scope, batch, event, correlation_id)?;
        Ok(rfq)
    }
}
