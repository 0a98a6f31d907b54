use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{Currency, DomainError, DomainResult, OrganizationId, ProjectId, Resource};

/// Organization-owned procurement boundary.
///
/// Every workflow entity references exactly one project; the scoped store
/// keys all access on it. The project row itself is self-scoped: reading it
/// requires a scope for this very project, so project rows cannot leak
/// across tenants either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub customer_org_id: OrganizationId,
    pub name: String,
    /// Planned budget in the smallest currency unit (e.g., cents).
    pub planned_budget: i64,
    pub currency: Currency,
    /// When false, budget validation reports but never blocks.
    pub budget_enforced: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        id: ProjectId,
        customer_org_id: OrganizationId,
        name: impl Into<String>,
        planned_budget: i64,
        currency: Currency,
        budget_enforced: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("project name must not be empty"));
        }
        if planned_budget < 0 {
            return Err(DomainError::validation("planned_budget must not be negative"));
        }

        Ok(Self {
            id,
            customer_org_id,
            name,
            planned_budget,
            currency,
            budget_enforced,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.updated_at = now;
    }
}

impl Resource for Project {
    const RESOURCE_TYPE: &'static str = "project";

    fn resource_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn project_id(&self) -> ProjectId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_is_self_scoped() {
        let project = Project::new(
            ProjectId::new(),
            OrganizationId::new(),
            "HQ refurbishment",
            1_000_000,
            Currency::USD,
            true,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(project.project_id(), project.id);
    }

    #[test]
    fn rejects_blank_name_and_negative_budget() {
        let now = Utc::now();
        let blank = Project::new(
            ProjectId::new(),
            OrganizationId::new(),
            "  ",
            0,
            Currency::USD,
            true,
            now,
        );
        assert!(matches!(blank, Err(DomainError::Validation(_))));

        let negative = Project::new(
            ProjectId::new(),
            OrganizationId::new(),
            "Site A",
            -1,
            Currency::USD,
            true,
            now,
        );
        assert!(matches!(negative, Err(DomainError::Validation(_))));
    }
}
