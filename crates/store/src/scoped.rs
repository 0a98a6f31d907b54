use std::sync::Arc;

use uuid::Uuid;

use procura_auth::TenantScope;
use procura_core::{DomainError, DomainResult};

use crate::envelope::{RecordEnvelope, WriteOp};
use crate::query::ListQuery;

/// Project-scoped record store.
///
/// Implementations must guarantee:
/// - **Structural scoping**: reads never return a row from a different
///   project, for any id, unless `scope.admin_override` is set, and then
///   the access is audited. There is no unscoped read path.
/// - **No existence leaks**: a row outside the caller's project is
///   indistinguishable from an absent row.
/// - **Atomic batches**: `apply` commits a whole batch or nothing. Every op
///   carries an expected version; a mismatch anywhere fails the batch with
///   [`DomainError::Locked`].
/// - **Write scoping**: writes are *never* widened, admin override or not;
///   an op targeting another project fails with `ScopeViolation`.
pub trait ScopedStore: Send + Sync {
    fn get(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<Option<RecordEnvelope>>;

    fn list(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<Vec<RecordEnvelope>>;

    fn count(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<u64>;

    fn exists(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<bool>;

    /// Apply one logical transaction.
    fn apply(&self, scope: &TenantScope, batch: Vec<WriteOp>) -> DomainResult<()>;
}

impl<S> ScopedStore for Arc<S>
where
    S: ScopedStore + ?Sized,
{
    fn get(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<Option<RecordEnvelope>> {
        (**self).get(scope, resource_type, id, include_deleted)
    }

    fn list(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<Vec<RecordEnvelope>> {
        (**self).list(scope, resource_type, query)
    }

    fn count(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<u64> {
        (**self).count(scope, resource_type, query)
    }

    fn exists(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<bool> {
        (**self).exists(scope, resource_type, id, include_deleted)
    }

    fn apply(&self, scope: &TenantScope, batch: Vec<WriteOp>) -> DomainResult<()> {
        (**self).apply(scope, batch)
    }
}

/// Audit line for every read served outside the caller's project scope.
/// Mandatory for both backends; widening is never silent.
pub(crate) fn audit_widened_read(scope: &TenantScope, resource_type: &str, detail: &str) {
    tracing::warn!(
        actor_id = %scope.actor_id(),
        organization_id = %scope.organization_id(),
        project_id = %scope.project_id(),
        resource_type,
        detail,
        justification = scope.override_justification().unwrap_or("<none>"),
        "admin override read outside project scope"
    );
}

/// Writes are never widened: every op must target the caller's project.
pub(crate) fn check_write_scope(scope: &TenantScope, op: &WriteOp) -> DomainResult<()> {
    if op.project_id != scope.project_id() {
        return Err(DomainError::scope_violation(format!(
            "write to {}/{} targets a different project than the caller's scope",
            op.resource_type, op.record_id
        )));
    }
    Ok(())
}
