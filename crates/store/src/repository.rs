use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use procura_auth::TenantScope;
use procura_core::{DomainError, DomainResult, Resource};

use crate::envelope::{RecordEnvelope, Versioned, WriteOp};
use crate::query::ListQuery;
use crate::scoped::ScopedStore;

/// Typed data access for one resource kind.
///
/// This is the surface domain repositories consume: every operation takes a
/// [`TenantScope`], capability checks are static-by-declaration
/// (`Resource::SOFT_DELETE` / `Resource::HARD_DELETE`), and `project_id`
/// immutability is enforced here before anything reaches the backend.
#[derive(Debug)]
pub struct ScopedRepository<R, S: ?Sized> {
    store: Arc<S>,
    _marker: PhantomData<fn() -> R>,
}

impl<R, S> Clone for ScopedRepository<R, S>
where
    S: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<R, S> ScopedRepository<R, S>
where
    R: Resource + Serialize + DeserializeOwned,
    S: ScopedStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn encode(record: &R) -> DomainResult<JsonValue> {
        serde_json::to_value(record).map_err(|e| {
            DomainError::storage(format!(
                "payload encode failed for {}: {e}",
                R::RESOURCE_TYPE
            ))
        })
    }

    fn decode(envelope: &RecordEnvelope) -> DomainResult<R> {
        serde_json::from_value(envelope.payload.clone()).map_err(|e| {
            DomainError::storage(format!(
                "payload decode failed for {}: {e}",
                R::RESOURCE_TYPE
            ))
        })
    }

    pub fn get_by_id(
        &self,
        scope: &TenantScope,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<R> {
        let envelope = self
            .store
            .get(scope, R::RESOURCE_TYPE, id, include_deleted)?
            .ok_or(DomainError::NotFound)?;
        Self::decode(&envelope)
    }

    /// Record plus the row version it was read at, for transition staging.
    pub fn get_versioned(&self, scope: &TenantScope, id: Uuid) -> DomainResult<Versioned<R>> {
        let envelope = self
            .store
            .get(scope, R::RESOURCE_TYPE, id, false)?
            .ok_or(DomainError::NotFound)?;
        Ok(Versioned {
            record: Self::decode(&envelope)?,
            version: envelope.version,
        })
    }

    pub fn list(&self, scope: &TenantScope, query: &ListQuery) -> DomainResult<Vec<R>> {
        self.store
            .list(scope, R::RESOURCE_TYPE, query)?
            .iter()
            .map(Self::decode)
            .collect()
    }

    /// Versioned variant of `list`, for transitions that stage writes
    /// against rows they enumerated.
    pub fn list_versioned(
        &self,
        scope: &TenantScope,
        query: &ListQuery,
    ) -> DomainResult<Vec<Versioned<R>>> {
        self.store
            .list(scope, R::RESOURCE_TYPE, query)?
            .iter()
            .map(|envelope| {
                Ok(Versioned {
                    record: Self::decode(envelope)?,
                    version: envelope.version,
                })
            })
            .collect()
    }

    pub fn count(&self, scope: &TenantScope, query: &ListQuery) -> DomainResult<u64> {
        self.store.count(scope, R::RESOURCE_TYPE, query)
    }

    pub fn exists(
        &self,
        scope: &TenantScope,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<bool> {
        self.store
            .exists(scope, R::RESOURCE_TYPE, id, include_deleted)
    }

    /// Insert a new record into the caller's project.
    pub fn create(&self, scope: &TenantScope, record: &R) -> DomainResult<R> {
        if record.project_id() != scope.project_id() {
            return Err(DomainError::scope_violation(format!(
                "cannot create {} outside the caller's project scope",
                R::RESOURCE_TYPE
            )));
        }

        self.store.apply(scope, vec![self.stage_create(record)?])?;
        Ok(record.clone())
    }

    /// Replace a record. `project_id` is immutable; soft-deleted rows read
    /// as absent (no update-after-restore).
    pub fn update(&self, scope: &TenantScope, id: Uuid, record: &R) -> DomainResult<R> {
        if record.resource_id() != id {
            return Err(DomainError::validation(format!(
                "record id does not match the {} row being updated",
                R::RESOURCE_TYPE
            )));
        }

        let current = self.get_versioned(scope, id)?;
        let op = self.stage_update(&current, record)?;
        self.store.apply(scope, vec![op])?;
        Ok(record.clone())
    }

    /// Set the deletion marker. Requires the resource to declare the
    /// capability.
    pub fn soft_delete(
        &self,
        scope: &TenantScope,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !R::SOFT_DELETE {
            return Err(DomainError::unsupported(format!(
                "{} does not support soft delete",
                R::RESOURCE_TYPE
            )));
        }

        let current = self.get_versioned(scope, id)?;
        self.store.apply(
            scope,
            vec![WriteOp::soft_delete(
                R::RESOURCE_TYPE,
                id,
                current.record.project_id(),
                current.version,
                current.record.created_at(),
                now,
            )],
        )
    }

    /// Irreversible hard delete. Requires the resource to declare the
    /// capability; workflow entities do not.
    pub fn delete(&self, scope: &TenantScope, id: Uuid) -> DomainResult<()> {
        if !R::HARD_DELETE {
            return Err(DomainError::unsupported(format!(
                "{} does not support hard delete",
                R::RESOURCE_TYPE
            )));
        }

        let envelope = self
            .store
            .get(scope, R::RESOURCE_TYPE, id, true)?
            .ok_or(DomainError::NotFound)?;

        self.store.apply(
            scope,
            vec![WriteOp::hard_delete(
                R::RESOURCE_TYPE,
                id,
                envelope.project_id,
                envelope.version,
                envelope.created_at,
            )],
        )
    }

    /// Build the insert op for a multi-entity transaction batch.
    pub fn stage_create(&self, record: &R) -> DomainResult<WriteOp> {
        Ok(WriteOp::insert(
            R::RESOURCE_TYPE,
            record.resource_id(),
            record.project_id(),
            record.created_at(),
            Self::encode(record)?,
        ))
    }

    /// Build the CAS update op for a multi-entity transaction batch.
    pub fn stage_update(&self, current: &Versioned<R>, updated: &R) -> DomainResult<WriteOp> {
        if updated.resource_id() != current.record.resource_id() {
            return Err(DomainError::validation(format!(
                "staged {} update targets a different record",
                R::RESOURCE_TYPE
            )));
        }
        if updated.project_id() != current.record.project_id() {
            return Err(DomainError::scope_violation(format!(
                "project_id of {} is immutable",
                R::RESOURCE_TYPE
            )));
        }

        Ok(WriteOp::put(
            R::RESOURCE_TYPE,
            updated.resource_id(),
            updated.project_id(),
            current.version,
            current.record.created_at(),
            Self::encode(updated)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use procura_auth::Role;
    use procura_core::{OrganizationId, ProjectId, UserId};

    use crate::in_memory::InMemoryScopedStore;

    use super::*;

    /// Minimal resource exercising every capability.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        project_id: ProjectId,
        body: String,
        created_at: DateTime<Utc>,
    }

    impl Note {
        fn new(project_id: ProjectId, body: &str) -> Self {
            Self {
                id: Uuid::now_v7(),
                project_id,
                body: body.to_string(),
                created_at: Utc::now(),
            }
        }
    }

    impl Resource for Note {
        const RESOURCE_TYPE: &'static str = "note";
        const SOFT_DELETE: bool = true;
        const HARD_DELETE: bool = true;

        fn resource_id(&self) -> Uuid {
            self.id
        }

        fn project_id(&self) -> ProjectId {
            self.project_id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    /// Same shape, no delete capabilities.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ledgered {
        id: Uuid,
        project_id: ProjectId,
        created_at: DateTime<Utc>,
    }

    impl Resource for Ledgered {
        const RESOURCE_TYPE: &'static str = "ledgered";

        fn resource_id(&self) -> Uuid {
            self.id
        }

        fn project_id(&self) -> ProjectId {
            self.project_id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    fn setup() -> (
        Arc<InMemoryScopedStore>,
        TenantScope,
        ScopedRepository<Note, InMemoryScopedStore>,
    ) {
        let store = Arc::new(InMemoryScopedStore::new());
        let scope = TenantScope::new(
            OrganizationId::new(),
            ProjectId::new(),
            UserId::new(),
            Role::BUYER,
        );
        let repo = ScopedRepository::<Note, _>::new(Arc::clone(&store));
        (store, scope, repo)
    }

    #[test]
    fn create_and_get_round_trip() {
        let (_store, scope, repo) = setup();
        let note = Note::new(scope.project_id(), "kickoff minutes");

        repo.create(&scope, &note).unwrap();
        let loaded = repo.get_by_id(&scope, note.id, false).unwrap();
        assert_eq!(loaded, note);
        assert!(repo.exists(&scope, note.id, false).unwrap());
    }

    #[test]
    fn create_outside_scope_is_a_violation() {
        let (_store, scope, repo) = setup();
        let foreign = Note::new(ProjectId::new(), "smuggled");

        let err = repo.create(&scope, &foreign).unwrap_err();
        assert_eq!(err.code(), "SCOPE_VIOLATION");
    }

    #[test]
    fn update_cannot_move_a_row_between_projects() {
        let (_store, scope, repo) = setup();
        let note = Note::new(scope.project_id(), "original");
        repo.create(&scope, &note).unwrap();

        let mut moved = note.clone();
        moved.project_id = ProjectId::new();
        moved.body = "relocated".to_string();

        let err = repo.update(&scope, note.id, &moved).unwrap_err();
        assert_eq!(err.code(), "SCOPE_VIOLATION");

        // Row untouched.
        let loaded = repo.get_by_id(&scope, note.id, false).unwrap();
        assert_eq!(loaded.body, "original");
    }

    #[test]
    fn update_of_foreign_row_reads_as_not_found() {
        let (store, scope, repo) = setup();
        let other_scope = TenantScope::new(
            OrganizationId::new(),
            ProjectId::new(),
            UserId::new(),
            Role::BUYER,
        );
        let other_repo = ScopedRepository::<Note, _>::new(Arc::clone(&store));
        let foreign = Note::new(other_scope.project_id(), "theirs");
        other_repo.create(&other_scope, &foreign).unwrap();

        // Even with the concrete id in hand, the other project's row does
        // not exist as far as this scope can tell.
        let mut hijack = foreign.clone();
        hijack.project_id = scope.project_id();
        let err = repo.update(&scope, foreign.id, &hijack).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn soft_delete_then_update_is_not_found() {
        let (_store, scope, repo) = setup();
        let note = Note::new(scope.project_id(), "to be removed");
        repo.create(&scope, &note).unwrap();

        repo.soft_delete(&scope, note.id, Utc::now()).unwrap();
        assert!(matches!(
            repo.get_by_id(&scope, note.id, false),
            Err(DomainError::NotFound)
        ));
        assert!(repo.get_by_id(&scope, note.id, true).is_ok());

        let err = repo.update(&scope, note.id, &note).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn delete_capabilities_are_declared_per_resource() {
        let (store, scope, repo) = setup();
        let note = Note::new(scope.project_id(), "temp");
        repo.create(&scope, &note).unwrap();
        repo.delete(&scope, note.id).unwrap();
        assert!(!repo.exists(&scope, note.id, true).unwrap());

        let ledgered_repo = ScopedRepository::<Ledgered, _>::new(Arc::clone(&store));
        let row = Ledgered {
            id: Uuid::now_v7(),
            project_id: scope.project_id(),
            created_at: Utc::now(),
        };
        ledgered_repo.create(&scope, &row).unwrap();

        let err = ledgered_repo.soft_delete(&scope, row.id, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
        let err = ledgered_repo.delete(&scope, row.id).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn list_with_payload_filter() {
        let (_store, scope, repo) = setup();
        repo.create(&scope, &Note::new(scope.project_id(), "alpha")).unwrap();
        repo.create(&scope, &Note::new(scope.project_id(), "beta")).unwrap();
        repo.create(&scope, &Note::new(scope.project_id(), "alpha")).unwrap();

        let alphas = repo
            .list(&scope, &ListQuery::new().with_filter("body", json!("alpha")))
            .unwrap();
        assert_eq!(alphas.len(), 2);
        assert_eq!(repo.count(&scope, &ListQuery::default()).unwrap(), 3);
    }

    #[test]
    fn stale_staged_update_loses_the_race() {
        let (store, scope, repo) = setup();
        let note = Note::new(scope.project_id(), "v1");
        repo.create(&scope, &note).unwrap();

        let snapshot = repo.get_versioned(&scope, note.id).unwrap();

        // A competing writer lands first.
        let mut competing = note.clone();
        competing.body = "v2".to_string();
        repo.update(&scope, note.id, &competing).unwrap();

        // The stale snapshot's staged write must fail and change nothing.
        let mut stale = note.clone();
        stale.body = "v2-stale".to_string();
        let op = repo.stage_update(&snapshot, &stale).unwrap();
        let err = store.apply(&scope, vec![op]).unwrap_err();
        assert_eq!(err.code(), "RFQ_LOCKED");

        assert_eq!(repo.get_by_id(&scope, note.id, false).unwrap().body, "v2");
    }
}
