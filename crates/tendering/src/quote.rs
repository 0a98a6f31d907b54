use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, OrganizationId, ProjectId, Resource, impl_uuid_id};
use procura_events::DomainEvent;

use crate::rfq::RfqId;

/// Quote identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(Uuid);

impl_uuid_id!(QuoteId, "QuoteId");

/// Quote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Submitted,
    Superseded,
    Accepted,
    Declined,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Superseded => "superseded",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl core::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier-provided free-text fields.
///
/// All of these are identity-bearing and fall under the anonymity mask until
/// the owning RFQ's order reaches its reveal point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDetails {
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

/// A supplier's bid against an RFQ.
///
/// Identified by `(rfq_id, supplier_org_id, revision_no)`; `revision_no` is
/// strictly increasing per supplier and greater than 1 only for revisions
/// created inside an open second-chance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    id: QuoteId,
    project_id: ProjectId,
    rfq_id: RfqId,
    supplier_org_id: OrganizationId,
    revision_no: u32,
    status: QuoteStatus,
    /// Total in the smallest currency unit (e.g., cents).
    total_amount: i64,
    details: QuoteDetails,
    submitted_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Quote {
    /// Initial submission (revision 1).
    pub fn initial(
        id: QuoteId,
        project_id: ProjectId,
        rfq_id: RfqId,
        supplier_org_id: OrganizationId,
        total_amount: i64,
        details: QuoteDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if total_amount <= 0 {
            return Err(DomainError::validation("quote total_amount must be positive"));
        }

        Ok(Self {
            id,
            project_id,
            rfq_id,
            supplier_org_id,
            revision_no: 1,
            status: QuoteStatus::Submitted,
            total_amount,
            details,
            submitted_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// Second-chance revision of `previous`. The caller supersedes
    /// `previous` in the same transaction.
    pub fn revision(
        previous: &Quote,
        id: QuoteId,
        total_amount: i64,
        details: QuoteDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if previous.status != QuoteStatus::Submitted {
            return Err(DomainError::validation(format!(
                "only a submitted quote can be revised (found {})",
                previous.status
            )));
        }
        if total_amount <= 0 {
            return Err(DomainError::validation("quote total_amount must be positive"));
        }

        Ok(Self {
            id,
            project_id: previous.project_id,
            rfq_id: previous.rfq_id,
            supplier_org_id: previous.supplier_org_id,
            revision_no: previous.revision_no + 1,
            status: QuoteStatus::Submitted,
            total_amount,
            details,
            submitted_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> QuoteId {
        self.id
    }

    pub fn rfq_id(&self) -> RfqId {
        self.rfq_id
    }

    pub fn supplier_org_id(&self) -> OrganizationId {
        self.supplier_org_id
    }

    pub fn revision_no(&self) -> u32 {
        self.revision_no
    }

    pub fn status(&self) -> QuoteStatus {
        self.status
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn details(&self) -> &QuoteDetails {
        &self.details
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Acceptable as an award target.
    pub fn is_acceptable(&self) -> bool {
        self.status == QuoteStatus::Submitted
    }

    fn invalid(&self, to: QuoteStatus) -> DomainError {
        DomainError::invalid_transition("quote", self.status, to)
    }

    /// Marks this quote replaced by a newer revision.
    pub fn supersede(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != QuoteStatus::Submitted {
            return Err(self.invalid(QuoteStatus::Superseded));
        }
        self.status = QuoteStatus::Superseded;
        self.updated_at = now;
        Ok(())
    }

    /// Marks this quote as the award winner.
    pub fn accept(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != QuoteStatus::Submitted {
            return Err(self.invalid(QuoteStatus::Accepted));
        }
        self.status = QuoteStatus::Accepted;
        self.updated_at = now;
        Ok(())
    }

    /// Marks a losing quote once the RFQ is awarded.
    pub fn decline(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != QuoteStatus::Submitted {
            return Err(self.invalid(QuoteStatus::Declined));
        }
        self.status = QuoteStatus::Declined;
        self.updated_at = now;
        Ok(())
    }
}

impl Resource for Quote {
    const RESOURCE_TYPE: &'static str = "quote";

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

/// Event: QuoteSubmitted.
///
/// Deliberately carries no supplier identity: envelopes cross the platform
/// boundary while the anonymity window may still be open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSubmitted {
    pub quote_id: QuoteId,
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub revision_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteEvent {
    QuoteSubmitted(QuoteSubmitted),
}

impl DomainEvent for QuoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuoteEvent::QuoteSubmitted(_) => "quote.submitted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuoteEvent::QuoteSubmitted(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_quote(amount: i64) -> Quote {
        Quote::initial(
            QuoteId::new(),
            ProjectId::new(),
            RfqId::new(),
            OrganizationId::new(),
            amount,
            QuoteDetails::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn initial_submission_is_revision_one() {
        let quote = test_quote(250_000);
        assert_eq!(quote.revision_no(), 1);
        assert_eq!(quote.status(), QuoteStatus::Submitted);
        assert!(quote.is_acceptable());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let err = Quote::initial(
            QuoteId::new(),
            ProjectId::new(),
            RfqId::new(),
            OrganizationId::new(),
            0,
            QuoteDetails::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn revision_increments_and_preserves_identity() {
        let now = Utc::now();
        let first = test_quote(300_000);
        let second = Quote::revision(
            &first,
            QuoteId::new(),
            280_000,
            QuoteDetails::default(),
            now,
        )
        .unwrap();

        assert_eq!(second.revision_no(), 2);
        assert_eq!(second.rfq_id(), first.rfq_id());
        assert_eq!(second.supplier_org_id(), first.supplier_org_id());
        assert_eq!(second.status(), QuoteStatus::Submitted);
    }

    #[test]
    fn cannot_revise_a_superseded_quote() {
        let now = Utc::now();
        let mut first = test_quote(300_000);
        first.supersede(now).unwrap();

        let err = Quote::revision(
            &first,
            QuoteId::new(),
            280_000,
            QuoteDetails::default(),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn accept_and_decline_require_submitted() {
        let now = Utc::now();

        let mut quote = test_quote(100);
        quote.accept(now).unwrap();
        assert_eq!(quote.status(), QuoteStatus::Accepted);
        assert!(matches!(
            quote.decline(now),
            Err(DomainError::InvalidStateTransition(_))
        ));

        let mut quote = test_quote(100);
        quote.decline(now).unwrap();
        assert_eq!(quote.status(), QuoteStatus::Declined);
        assert!(!quote.is_acceptable());
    }
}
