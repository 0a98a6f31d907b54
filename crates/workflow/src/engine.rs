use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use procura_anonymity::AnonymityGuard;
use procura_auth::TenantScope;
use procura_core::{DomainError, DomainResult};
use procura_events::{DomainEvent, EventEnvelope, EventOutbox, EventPublisher};
use procura_store::{ListQuery, ScopedStore, WriteOp};

use crate::repos::ProcurementRepos;

/// Workflow engine: one entry point per lifecycle transition.
///
/// Per transition: load versioned rows, run guards on copies, stage every
/// change into one batch, apply it atomically, then publish exactly one
/// domain event. Events are enqueued strictly post-commit; a publish failure
/// is logged and left to the external job runtime, never rolled back.
#[derive(Debug)]
pub struct WorkflowEngine<S: ?Sized, P: ?Sized> {
    pub(crate) store: Arc<S>,
    pub(crate) publisher: Arc<P>,
    pub(crate) repos: ProcurementRepos<S>,
    pub(crate) guard: AnonymityGuard,
}

impl<S, P> WorkflowEngine<S, P>
where
    S: ScopedStore + ?Sized,
    P: EventPublisher + ?Sized,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        let repos = ProcurementRepos::new(&store);
        Self {
            store,
            publisher,
            repos,
            guard: AnonymityGuard::new(),
        }
    }

    /// The repositories, for read paths the engine does not mediate
    /// (listing RFQs, dashboards, etc.). Quote reads stay behind
    /// [`WorkflowEngine::view_quote`] / [`WorkflowEngine::reveal_quote`].
    pub fn repos(&self) -> &ProcurementRepos<S> {
        &self.repos
    }

    /// Apply the batch, then publish the transition's event.
    ///
    /// The envelope is built first so a serialization failure aborts before
    /// anything is written.
    pub(crate) fn commit<E>(
        &self,
        scope: &TenantScope,
        batch: Vec<WriteOp>,
        event: E,
        correlation_id: Uuid,
    ) -> DomainResult<()>
    where
        E: DomainEvent + Serialize,
    {
        let envelope = EventEnvelope::from_typed(scope.project_id(), correlation_id, &event)?;

        self.store.apply(scope, batch)?;

        let mut outbox = EventOutbox::new();
        outbox.stage(envelope);
        let failed = outbox.publish_all(&*self.publisher);
        if !failed.is_empty() {
            tracing::warn!(
                correlation_id = %correlation_id,
                failed = failed.len(),
                "transition committed but its event was not accepted; job runtime will retry"
            );
        }

        Ok(())
    }

    pub(crate) fn require_manager(scope: &TenantScope) -> DomainResult<()> {
        if !scope.role().is_procurement_manager() {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    pub(crate) fn require_approver(scope: &TenantScope) -> DomainResult<()> {
        if !scope.role().is_approver() {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    pub(crate) fn require_supplier(scope: &TenantScope) -> DomainResult<()> {
        if !scope.role().is_supplier() {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    /// Buyer-side actions: buyers and managers both qualify.
    pub(crate) fn require_buyer(scope: &TenantScope) -> DomainResult<()> {
        if *scope.role() != procura_auth::Role::BUYER && !scope.role().is_procurement_manager() {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    /// Query shape for "all rows of this kind in the project".
    pub(crate) fn unpaged() -> ListQuery {
        ListQuery::new().with_limit(usize::MAX)
    }
}
