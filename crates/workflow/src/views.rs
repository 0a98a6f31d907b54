//! Quote access for customer-side callers.
//!
//! These are the only read paths for quote data on the requesting side;
//! suppliers reading their own quotes are the one exemption from masking.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use procura_anonymity::{AuditedQuoteView, IdentityVisibility, QuoteView};
use procura_auth::TenantScope;
use procura_core::DomainResult;
use procura_events::EventPublisher;
use procura_store::ScopedStore;
use procura_tendering::{QuoteId, RfqId};

use crate::engine::WorkflowEngine;

impl<S, P> WorkflowEngine<S, P>
where
    S: ScopedStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    /// Reveal point for an RFQ's quotes: reached once any of its orders
    /// has been signed (the order created from the accepted quote).
    fn rfq_visibility(
        &self,
        scope: &TenantScope,
        rfq_id: RfqId,
    ) -> DomainResult<IdentityVisibility> {
        let orders = self
            .repos
            .orders
            .list(scope, &Self::unpaged().with_filter("rfq_id", json!(rfq_id)))?;

        Ok(if orders.iter().any(|o| o.identity_reveal_reached()) {
            IdentityVisibility::Revealed
        } else {
            IdentityVisibility::Masked
        })
    }

    /// Quote projection for the caller. Masked while the anonymity window
    /// is open; suppliers always see their own quotes in full.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), quote_id = %quote_id), err)]
    pub fn view_quote(
        &self,
        scope: &TenantScope,
        quote_id: QuoteId,
    ) -> DomainResult<QuoteView> {
        let quote = self
            .repos
            .quotes
            .get_by_id(scope, *quote_id.as_uuid(), false)?;

        if scope.organization_id() == quote.supplier_org_id() {
            return Ok(self.guard.mask(scope, &quote, IdentityVisibility::Revealed));
        }

        let visibility = self.rfq_visibility(scope, quote.rfq_id())?;
        Ok(self.guard.mask(scope, &quote, visibility))
    }

    /// Full-identity projection, post-reveal-point only. The audit record
    /// is persisted in the same transaction that serves the view.
    #[instrument(skip_all, fields(project_id = %scope.project_id(), quote_id = %quote_id), err)]
    pub fn reveal_quote(
        &self,
        scope: &TenantScope,
        quote_id: QuoteId,
        now: DateTime<Utc>,
    ) -> DomainResult<AuditedQuoteView> {
        let quote = self
            .repos
            .quotes
            .get_by_id(scope, *quote_id.as_uuid(), false)?;

        let visibility = self.rfq_visibility(scope, quote.rfq_id())?;
        let audited = self.guard.reveal(scope, &quote, visibility, now)?;

        self.store.apply(
            scope,
            vec![self.repos.reveal_audits.stage_create(&audited.audit)?],
        )?;

        Ok(audited)
    }
}
