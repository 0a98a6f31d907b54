use chrono::{DateTime, Utc};
use serde::Serialize;

use procura_auth::TenantScope;
use procura_core::{DomainError, DomainResult, OrganizationId};
use procura_tendering::{Quote, QuoteId, QuoteStatus, RfqId};

use crate::audit::IdentityRevealAudit;
use crate::patterns;

/// Whether the owning RFQ's order has reached its identity-reveal point
/// (`signed` or later). Computed by the caller from order state; this layer
/// only enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityVisibility {
    Masked,
    Revealed,
}

/// Customer-facing projection of a quote.
///
/// Inside the anonymity window the supplier fields are absent and free text
/// is scrubbed; after the reveal point the full record is projected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteView {
    pub id: QuoteId,
    pub rfq_id: RfqId,
    pub revision_no: u32,
    pub status: QuoteStatus,
    pub total_amount: i64,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub supplier_org_id: Option<OrganizationId>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

/// Result of an audited reveal: the full projection plus the audit row the
/// caller must persist in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditedQuoteView {
    pub view: QuoteView,
    pub audit: IdentityRevealAudit,
}

/// Mandatory projection layer between stored quotes and customer-side
/// callers. There is no other path to quote data for the requesting side.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymityGuard;

impl AnonymityGuard {
    pub fn new() -> Self {
        Self
    }

    fn full_view(quote: &Quote) -> QuoteView {
        let details = quote.details();
        QuoteView {
            id: quote.id(),
            rfq_id: quote.rfq_id(),
            revision_no: quote.revision_no(),
            status: quote.status(),
            total_amount: quote.total_amount(),
            submitted_at: quote.submitted_at(),
            notes: details.notes.clone(),
            supplier_org_id: Some(quote.supplier_org_id()),
            contact_name: details.contact_name.clone(),
            contact_email: details.contact_email.clone(),
            contact_phone: details.contact_phone.clone(),
        }
    }

    fn masked_view(quote: &Quote) -> QuoteView {
        let details = quote.details();
        let known_names: Vec<&str> = details.contact_name.as_deref().into_iter().collect();

        QuoteView {
            id: quote.id(),
            rfq_id: quote.rfq_id(),
            revision_no: quote.revision_no(),
            status: quote.status(),
            total_amount: quote.total_amount(),
            submitted_at: quote.submitted_at(),
            notes: details
                .notes
                .as_deref()
                .map(|n| patterns::scrub(n, &known_names)),
            supplier_org_id: None,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
        }
    }

    /// Project a quote for the caller, masking identity while the anonymity
    /// window is open.
    pub fn mask(
        &self,
        scope: &TenantScope,
        quote: &Quote,
        visibility: IdentityVisibility,
    ) -> QuoteView {
        match visibility {
            IdentityVisibility::Revealed => Self::full_view(quote),
            IdentityVisibility::Masked => {
                tracing::trace!(
                    actor_id = %scope.actor_id(),
                    quote_id = %quote.id(),
                    "serving masked quote view"
                );
                Self::masked_view(quote)
            }
        }
    }

    /// Full-identity projection, only legal after the reveal point.
    ///
    /// Every successful call produces exactly one audit record, which the
    /// caller persists alongside serving the view. Pre-reveal calls are
    /// security events.
    pub fn reveal(
        &self,
        scope: &TenantScope,
        quote: &Quote,
        visibility: IdentityVisibility,
        now: DateTime<Utc>,
    ) -> DomainResult<AuditedQuoteView> {
        if visibility == IdentityVisibility::Masked {
            tracing::warn!(
                actor_id = %scope.actor_id(),
                organization_id = %scope.organization_id(),
                quote_id = %quote.id(),
                rfq_id = %quote.rfq_id(),
                "identity reveal attempted inside the anonymity window"
            );
            return Err(DomainError::anonymity(
                "supplier identity is masked until the order is signed",
            ));
        }

        let audit = IdentityRevealAudit::record(
            scope.project_id(),
            quote.id(),
            scope.actor_id(),
            now,
        );

        tracing::info!(
            actor_id = %scope.actor_id(),
            quote_id = %quote.id(),
            audit_id = %audit.id,
            "supplier identity revealed"
        );

        Ok(AuditedQuoteView {
            view: Self::full_view(quote),
            audit,
        })
    }
}
