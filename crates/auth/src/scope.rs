use serde::{Deserialize, Serialize};

use procura_core::{OrganizationId, ProjectId, UserId};

use crate::Role;

/// Tenant scope for a request or job.
///
/// Immutable; produced once by the host auth/middleware layer and threaded
/// through every store and workflow call. The scope is trusted as already
/// authenticated and authorized for membership; downstream layers enforce
/// *scope*, not identity.
///
/// `admin_override` is never implicit: it can only be set through
/// [`TenantScope::with_admin_override`], which demands a justification that
/// storage layers attach to every audit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    organization_id: OrganizationId,
    project_id: ProjectId,
    actor_id: UserId,
    role: Role,
    admin_override: bool,
    override_justification: Option<String>,
}

impl TenantScope {
    pub fn new(
        organization_id: OrganizationId,
        project_id: ProjectId,
        actor_id: UserId,
        role: Role,
    ) -> Self {
        Self {
            organization_id,
            project_id,
            actor_id,
            role,
            admin_override: false,
            override_justification: None,
        }
    }

    /// Widened scope for platform operators. Read paths honour the widening;
    /// every widened call is audited with this justification.
    pub fn with_admin_override(
        organization_id: OrganizationId,
        project_id: ProjectId,
        actor_id: UserId,
        role: Role,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            project_id,
            actor_id,
            role,
            admin_override: true,
            override_justification: Some(justification.into()),
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn actor_id(&self) -> UserId {
        self.actor_id
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn admin_override(&self) -> bool {
        self.admin_override
    }

    pub fn override_justification(&self) -> Option<&str> {
        self.override_justification.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (OrganizationId, ProjectId, UserId) {
        (OrganizationId::new(), ProjectId::new(), UserId::new())
    }

    #[test]
    fn plain_scope_has_no_override() {
        let (org, project, actor) = ids();
        let scope = TenantScope::new(org, project, actor, Role::BUYER);
        assert!(!scope.admin_override());
        assert!(scope.override_justification().is_none());
        assert_eq!(scope.project_id(), project);
    }

    #[test]
    fn override_requires_justification() {
        let (org, project, actor) = ids();
        let scope = TenantScope::with_admin_override(
            org,
            project,
            actor,
            Role::ADMIN,
            "incident INC-1042 cross-project audit",
        );
        assert!(scope.admin_override());
        assert_eq!(
            scope.override_justification(),
            Some("incident INC-1042 cross-project audit")
        );
    }
}
