use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, OrganizationId, ProjectId, Resource, impl_uuid_id};
use procura_events::DomainEvent;

/// RFQ identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RfqId(Uuid);

impl_uuid_id!(RfqId, "RfqId");

/// RFQ status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    Draft,
    Published,
    Bidding,
    SecondChance,
    Awarded,
    Closed,
    Cancelled,
}

impl RfqStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Bidding => "bidding",
            Self::SecondChance => "second_chance",
            Self::Awarded => "awarded",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tender request.
///
/// Mutated only through workflow transitions; never hard-deleted. All guard
/// checks run before any field changes so a failed transition leaves the
/// value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfq {
    id: RfqId,
    project_id: ProjectId,
    title: String,
    description: Option<String>,
    target_suppliers: Vec<OrganizationId>,
    status: RfqStatus,
    expires_at: Option<DateTime<Utc>>,
    second_chance_used: bool,
    second_chance_deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Rfq {
    pub fn draft(
        id: RfqId,
        project_id: ProjectId,
        title: impl Into<String>,
        description: Option<String>,
        target_suppliers: Vec<OrganizationId>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("rfq title must not be empty"));
        }

        Ok(Self {
            id,
            project_id,
            title,
            description,
            target_suppliers,
            status: RfqStatus::Draft,
            expires_at,
            second_chance_used: false,
            second_chance_deadline: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> RfqId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target_suppliers(&self) -> &[OrganizationId] {
        &self.target_suppliers
    }

    pub fn status(&self) -> RfqStatus {
        self.status
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn second_chance_used(&self) -> bool {
        self.second_chance_used
    }

    pub fn second_chance_deadline(&self) -> Option<DateTime<Utc>> {
        self.second_chance_deadline
    }

    /// True while the second-chance window accepts revisions.
    pub fn second_chance_open(&self, now: DateTime<Utc>) -> bool {
        self.status == RfqStatus::SecondChance
            && self.second_chance_deadline.is_some_and(|d| now <= d)
    }

    fn invalid(&self, to: &str) -> DomainError {
        DomainError::invalid_transition("rfq", self.status, to)
    }

    /// `draft -> published`. Requires at least one resolved target supplier.
    pub fn publish(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RfqStatus::Draft {
            return Err(self.invalid("published"));
        }
        if self.target_suppliers.is_empty() {
            return Err(DomainError::validation(
                "rfq cannot be published without target suppliers",
            ));
        }

        self.status = RfqStatus::Published;
        self.updated_at = now;
        Ok(())
    }

    /// `published -> bidding`, taken on the first valid quote submission.
    pub fn open_bidding(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RfqStatus::Published {
            return Err(self.invalid("bidding"));
        }

        self.status = RfqStatus::Bidding;
        self.updated_at = now;
        Ok(())
    }

    /// `bidding -> second_chance`. One trigger per RFQ, ever.
    pub fn open_second_chance(
        &mut self,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != RfqStatus::Bidding || self.second_chance_used {
            return Err(self.invalid("second_chance"));
        }
        if deadline <= now {
            return Err(DomainError::validation(
                "second-chance deadline must be in the future",
            ));
        }

        self.status = RfqStatus::SecondChance;
        self.second_chance_used = true;
        self.second_chance_deadline = Some(deadline);
        self.updated_at = now;
        Ok(())
    }

    /// `second_chance -> bidding`, driven by the external scheduler on
    /// deadline expiry. The deadline value is kept for audit.
    pub fn close_second_chance(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RfqStatus::SecondChance {
            return Err(self.invalid("bidding"));
        }

        self.status = RfqStatus::Bidding;
        self.updated_at = now;
        Ok(())
    }

    /// `bidding | second_chance -> awarded`.
    pub fn award(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.status, RfqStatus::Bidding | RfqStatus::SecondChance) {
            return Err(self.invalid("awarded"));
        }

        self.status = RfqStatus::Awarded;
        self.updated_at = now;
        Ok(())
    }

    /// Any non-terminal state -> `cancelled`. The engine additionally
    /// guards that no order of this RFQ has been released.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(self.invalid("cancelled"));
        }

        self.status = RfqStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// `awarded -> closed`, applied when the resulting order completes.
    pub fn close(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RfqStatus::Awarded {
            return Err(self.invalid("closed"));
        }

        self.status = RfqStatus::Closed;
        self.updated_at = now;
        Ok(())
    }

    /// Whether an initial quote submission is currently acceptable.
    pub fn accepts_initial_quotes(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, RfqStatus::Published | RfqStatus::Bidding)
            && !self.expires_at.is_some_and(|e| now > e)
    }
}

impl Resource for Rfq {
    const RESOURCE_TYPE: &'static str = "rfq";

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

/// Event: RfqCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqCreated {
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RfqPublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqPublished {
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SecondChanceOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondChanceOpened {
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub deadline: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SecondChanceClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondChanceClosed {
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RfqAwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqAwarded {
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub quote_id: Uuid,
    pub order_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RfqCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqCancelled {
    pub rfq_id: RfqId,
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RfqEvent {
    RfqCreated(RfqCreated),
    RfqPublished(RfqPublished),
    SecondChanceOpened(SecondChanceOpened),
    SecondChanceClosed(SecondChanceClosed),
    RfqAwarded(RfqAwarded),
    RfqCancelled(RfqCancelled),
}

impl DomainEvent for RfqEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RfqEvent::RfqCreated(_) => "rfq.created",
            RfqEvent::RfqPublished(_) => "rfq.published",
            RfqEvent::SecondChanceOpened(_) => "rfq.second_chance_opened",
            RfqEvent::SecondChanceClosed(_) => "rfq.second_chance_closed",
            RfqEvent::RfqAwarded(_) => "rfq.awarded",
            RfqEvent::RfqCancelled(_) => "rfq.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RfqEvent::RfqCreated(e) => e.occurred_at,
            RfqEvent::RfqPublished(e) => e.occurred_at,
            RfqEvent::SecondChanceOpened(e) => e.occurred_at,
            RfqEvent::SecondChanceClosed(e) => e.occurred_at,
            RfqEvent::RfqAwarded(e) => e.occurred_at,
            RfqEvent::RfqCancelled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rfq(suppliers: usize) -> Rfq {
        let targets = (0..suppliers).map(|_| OrganizationId::new()).collect();
        Rfq::draft(
            RfqId::new(),
            ProjectId::new(),
            "Structural steel package",
            None,
            targets,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn publish_requires_target_suppliers() {
        let mut rfq = test_rfq(0);
        let err = rfq.publish(Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(rfq.status(), RfqStatus::Draft);

        let mut rfq = test_rfq(2);
        rfq.publish(Utc::now()).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Published);
    }

    #[test]
    fn bidding_opens_only_from_published() {
        let mut rfq = test_rfq(1);
        assert!(matches!(
            rfq.open_bidding(Utc::now()),
            Err(DomainError::InvalidStateTransition(_))
        ));

        rfq.publish(Utc::now()).unwrap();
        rfq.open_bidding(Utc::now()).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Bidding);
    }

    #[test]
    fn second_chance_is_single_use() {
        let now = Utc::now();
        let deadline = now + chrono::Duration::hours(48);

        let mut rfq = test_rfq(2);
        rfq.publish(now).unwrap();
        rfq.open_bidding(now).unwrap();

        rfq.open_second_chance(deadline, now).unwrap();
        assert_eq!(rfq.status(), RfqStatus::SecondChance);
        assert!(rfq.second_chance_used());
        assert!(rfq.second_chance_open(now));

        // Triggering again while the window is open is an invalid transition.
        let err = rfq.open_second_chance(deadline, now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));

        // And again after the window closed: the used flag blocks it.
        rfq.close_second_chance(now).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Bidding);
        let err = rfq.open_second_chance(deadline, now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[test]
    fn second_chance_deadline_must_be_future() {
        let now = Utc::now();
        let mut rfq = test_rfq(1);
        rfq.publish(now).unwrap();
        rfq.open_bidding(now).unwrap();

        let err = rfq
            .open_second_chance(now - chrono::Duration::minutes(1), now)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(!rfq.second_chance_used());
    }

    #[test]
    fn award_allowed_from_bidding_and_second_chance() {
        let now = Utc::now();

        let mut rfq = test_rfq(1);
        rfq.publish(now).unwrap();
        rfq.open_bidding(now).unwrap();
        rfq.award(now).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Awarded);

        let mut rfq = test_rfq(1);
        rfq.publish(now).unwrap();
        rfq.open_bidding(now).unwrap();
        rfq.open_second_chance(now + chrono::Duration::hours(1), now)
            .unwrap();
        rfq.award(now).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Awarded);
    }

    #[test]
    fn cannot_award_from_draft_or_published() {
        let now = Utc::now();
        let mut rfq = test_rfq(1);
        assert!(rfq.award(now).is_err());
        rfq.publish(now).unwrap();
        assert!(rfq.award(now).is_err());
    }

    #[test]
    fn cancel_rejected_in_terminal_states() {
        let now = Utc::now();
        let mut rfq = test_rfq(1);
        rfq.publish(now).unwrap();
        rfq.open_bidding(now).unwrap();
        rfq.award(now).unwrap();
        rfq.close(now).unwrap();

        let err = rfq.cancel(now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[test]
    fn close_only_from_awarded() {
        let now = Utc::now();
        let mut rfq = test_rfq(1);
        assert!(rfq.close(now).is_err());

        rfq.publish(now).unwrap();
        rfq.open_bidding(now).unwrap();
        rfq.award(now).unwrap();
        rfq.close(now).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Closed);
        assert!(rfq.status().is_terminal());
    }

    #[test]
    fn expired_rfq_rejects_initial_quotes() {
        let now = Utc::now();
        let mut rfq = Rfq::draft(
            RfqId::new(),
            ProjectId::new(),
            "Electrical fit-out",
            None,
            vec![OrganizationId::new()],
            Some(now - chrono::Duration::minutes(5)),
            now - chrono::Duration::days(1),
        )
        .unwrap();
        rfq.publish(now - chrono::Duration::days(1)).unwrap();

        assert!(!rfq.accepts_initial_quotes(now));
    }

    #[test]
    fn failed_transition_leaves_rfq_untouched() {
        let now = Utc::now();
        let rfq = test_rfq(1);
        let mut probe = rfq.clone();

        assert!(probe.award(now).is_err());
        assert_eq!(probe, rfq);
    }
}
