use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use procura_auth::TenantScope;
use procura_core::{DomainError, DomainResult};

use crate::envelope::{RecordEnvelope, WriteAction, WriteOp};
use crate::query::{ListQuery, SortOrder};
use crate::scoped::{ScopedStore, audit_widened_read, check_write_scope};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    resource_type: String,
    record_id: Uuid,
}

/// In-memory scoped store.
///
/// Intended for tests/dev. The single write lock serializes `apply`
/// batches, which gives them serializable-transaction semantics for free.
#[derive(Debug, Default)]
pub struct InMemoryScopedStore {
    rows: RwLock<HashMap<RecordKey, RecordEnvelope>>,
}

impl InMemoryScopedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(resource_type: &str, record_id: Uuid) -> RecordKey {
        RecordKey {
            resource_type: resource_type.to_string(),
            record_id,
        }
    }

    fn matches_filters(envelope: &RecordEnvelope, query: &ListQuery) -> bool {
        query
            .filters
            .iter()
            .all(|(field, value)| envelope.payload.get(field) == Some(value))
    }

    /// Rows visible to this scope, filters applied, unsorted and unpaged.
    fn visible(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<Vec<RecordEnvelope>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| DomainError::storage("record map lock poisoned"))?;

        let widened = scope.admin_override();
        if widened {
            audit_widened_read(scope, resource_type, "list");
        }

        Ok(rows
            .iter()
            .filter(|(key, _)| key.resource_type == resource_type)
            .map(|(_, envelope)| envelope)
            .filter(|envelope| widened || envelope.project_id == scope.project_id())
            .filter(|envelope| query.include_deleted || !envelope.is_deleted())
            .filter(|envelope| Self::matches_filters(envelope, query))
            .cloned()
            .collect())
    }
}

impl ScopedStore for InMemoryScopedStore {
    fn get(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<Option<RecordEnvelope>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| DomainError::storage("record map lock poisoned"))?;

        let Some(envelope) = rows.get(&Self::key(resource_type, id)) else {
            return Ok(None);
        };

        if envelope.project_id != scope.project_id() {
            if !scope.admin_override() {
                // Indistinguishable from absent.
                return Ok(None);
            }
            audit_widened_read(scope, resource_type, "get");
        }

        if !include_deleted && envelope.is_deleted() {
            return Ok(None);
        }

        Ok(Some(envelope.clone()))
    }

    fn list(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<Vec<RecordEnvelope>> {
        let mut matched = self.visible(scope, resource_type, query)?;

        match query.order {
            SortOrder::CreatedAtDesc => {
                matched.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then(b.record_id.cmp(&a.record_id))
                });
            }
            SortOrder::CreatedAtAsc => {
                matched.sort_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then(a.record_id.cmp(&b.record_id))
                });
            }
        }

        Ok(matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    fn count(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<u64> {
        Ok(self.visible(scope, resource_type, query)?.len() as u64)
    }

    fn exists(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<bool> {
        Ok(self.get(scope, resource_type, id, include_deleted)?.is_some())
    }

    fn apply(&self, scope: &TenantScope, batch: Vec<WriteOp>) -> DomainResult<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| DomainError::storage("record map lock poisoned"))?;

        // Phase 1: validate every op before touching anything.
        for op in &batch {
            check_write_scope(scope, op)?;

            let existing = rows.get(&Self::key(op.resource_type, op.record_id));
            match (existing, op.expected_version) {
                (Some(_), 0) => {
                    return Err(DomainError::locked(format!(
                        "insert conflict for {}/{}",
                        op.resource_type, op.record_id
                    )));
                }
                (None, 0) => {
                    if !matches!(op.action, WriteAction::Put { .. }) {
                        return Err(DomainError::validation(
                            "only a put can target a non-existing row",
                        ));
                    }
                }
                (None, _) => {
                    return Err(DomainError::locked(format!(
                        "row {}/{} was removed by a concurrent transition",
                        op.resource_type, op.record_id
                    )));
                }
                (Some(row), expected) => {
                    if row.project_id != op.project_id {
                        return Err(DomainError::not_found());
                    }
                    if row.version != expected {
                        return Err(DomainError::locked(format!(
                            "version conflict for {}/{} (expected {}, found {})",
                            op.resource_type, op.record_id, expected, row.version
                        )));
                    }
                }
            }
        }

        // Phase 2: all checks passed; apply the whole batch.
        for op in batch {
            let key = Self::key(op.resource_type, op.record_id);
            match op.action {
                WriteAction::Put { payload } => {
                    let deleted_at = rows.get(&key).and_then(|row| row.deleted_at);
                    rows.insert(
                        key,
                        RecordEnvelope {
                            resource_type: op.resource_type.to_string(),
                            record_id: op.record_id,
                            project_id: op.project_id,
                            version: op.expected_version + 1,
                            deleted_at,
                            created_at: op.created_at,
                            payload,
                        },
                    );
                }
                WriteAction::SoftDelete { deleted_at } => {
                    if let Some(row) = rows.get_mut(&key) {
                        row.deleted_at = Some(deleted_at);
                        row.version = op.expected_version + 1;
                    }
                }
                WriteAction::HardDelete => {
                    rows.remove(&key);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use serde_json::json;

    use procura_auth::Role;
    use procura_core::{OrganizationId, ProjectId, UserId};

    use super::*;

    const DOC: &str = "doc";

    fn scope_for(project_id: ProjectId) -> TenantScope {
        TenantScope::new(
            OrganizationId::new(),
            project_id,
            UserId::new(),
            Role::BUYER,
        )
    }

    fn insert_doc(
        store: &InMemoryScopedStore,
        scope: &TenantScope,
        payload: serde_json::Value,
    ) -> Uuid {
        let id = Uuid::now_v7();
        store
            .apply(
                scope,
                vec![WriteOp::insert(DOC, id, scope.project_id(), Utc::now(), payload)],
            )
            .unwrap();
        id
    }

    #[test]
    fn rows_are_invisible_across_projects() {
        let store = InMemoryScopedStore::new();
        let p1 = scope_for(ProjectId::new());
        let p2 = scope_for(ProjectId::new());

        // p2 learns p1's id out of band; the read must still come back empty.
        let id = insert_doc(&store, &p1, json!({"kind": "secret"}));

        assert!(store.get(&p2, DOC, id, false).unwrap().is_none());
        assert!(!store.exists(&p2, DOC, id, false).unwrap());
        assert!(store.list(&p2, DOC, &ListQuery::default()).unwrap().is_empty());
        assert_eq!(store.count(&p2, DOC, &ListQuery::default()).unwrap(), 0);

        assert!(store.get(&p1, DOC, id, false).unwrap().is_some());
    }

    #[test]
    fn cross_project_write_is_a_scope_violation() {
        let store = InMemoryScopedStore::new();
        let p1 = scope_for(ProjectId::new());
        let p2 = scope_for(ProjectId::new());

        let err = store
            .apply(
                &p2,
                vec![WriteOp::insert(
                    DOC,
                    Uuid::now_v7(),
                    p1.project_id(),
                    Utc::now(),
                    json!({}),
                )],
            )
            .unwrap_err();
        assert_eq!(err.code(), "SCOPE_VIOLATION");
    }

    #[test]
    fn cross_project_cas_does_not_leak_existence() {
        let store = InMemoryScopedStore::new();
        let p1 = scope_for(ProjectId::new());
        let p2 = scope_for(ProjectId::new());

        let id = insert_doc(&store, &p1, json!({}));

        // p2 crafts an op against p1's row id but its own project: the row
        // appears absent, exactly like a real missing row.
        let err = store
            .apply(
                &p2,
                vec![WriteOp::put(DOC, id, p2.project_id(), 1, Utc::now(), json!({}))],
            )
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn admin_override_widens_reads_only() {
        let store = InMemoryScopedStore::new();
        let p1 = scope_for(ProjectId::new());
        let id = insert_doc(&store, &p1, json!({"kind": "audited"}));

        let admin = TenantScope::with_admin_override(
            OrganizationId::new(),
            ProjectId::new(),
            UserId::new(),
            Role::ADMIN,
            "support escalation",
        );

        assert!(store.get(&admin, DOC, id, false).unwrap().is_some());
        assert_eq!(store.count(&admin, DOC, &ListQuery::default()).unwrap(), 1);

        // Writes stay pinned to the caller's project even under override.
        let err = store
            .apply(
                &admin,
                vec![WriteOp::put(DOC, id, p1.project_id(), 1, Utc::now(), json!({}))],
            )
            .unwrap_err();
        assert_eq!(err.code(), "SCOPE_VIOLATION");
    }

    #[test]
    fn version_conflict_fails_whole_batch() {
        let store = InMemoryScopedStore::new();
        let scope = scope_for(ProjectId::new());

        let a = insert_doc(&store, &scope, json!({"n": 1}));
        let b = insert_doc(&store, &scope, json!({"n": 2}));

        // Second op carries a stale version: nothing may be applied.
        let err = store
            .apply(
                &scope,
                vec![
                    WriteOp::put(DOC, a, scope.project_id(), 1, Utc::now(), json!({"n": 10})),
                    WriteOp::put(DOC, b, scope.project_id(), 99, Utc::now(), json!({"n": 20})),
                ],
            )
            .unwrap_err();
        assert_eq!(err.code(), "RFQ_LOCKED");

        let a_row = store.get(&scope, DOC, a, false).unwrap().unwrap();
        assert_eq!(a_row.payload, json!({"n": 1}));
        assert_eq!(a_row.version, 1);
    }

    #[test]
    fn insert_conflict_is_a_lock_error() {
        let store = InMemoryScopedStore::new();
        let scope = scope_for(ProjectId::new());
        let id = insert_doc(&store, &scope, json!({}));

        let err = store
            .apply(
                &scope,
                vec![WriteOp::insert(DOC, id, scope.project_id(), Utc::now(), json!({}))],
            )
            .unwrap_err();
        assert_eq!(err.code(), "RFQ_LOCKED");
    }

    #[test]
    fn soft_deleted_rows_hide_from_default_reads() {
        let store = InMemoryScopedStore::new();
        let scope = scope_for(ProjectId::new());
        let id = insert_doc(&store, &scope, json!({"kind": "draft"}));

        store
            .apply(
                &scope,
                vec![WriteOp::soft_delete(
                    DOC,
                    id,
                    scope.project_id(),
                    1,
                    Utc::now(),
                    Utc::now(),
                )],
            )
            .unwrap();

        assert!(store.get(&scope, DOC, id, false).unwrap().is_none());
        assert!(store.list(&scope, DOC, &ListQuery::default()).unwrap().is_empty());

        let raw = store.get(&scope, DOC, id, true).unwrap().unwrap();
        assert!(raw.is_deleted());
        assert_eq!(raw.version, 2);
        assert_eq!(
            store
                .count(&scope, DOC, &ListQuery::new().including_deleted())
                .unwrap(),
            1
        );
    }

    #[test]
    fn hard_delete_removes_the_row() {
        let store = InMemoryScopedStore::new();
        let scope = scope_for(ProjectId::new());
        let id = insert_doc(&store, &scope, json!({}));

        store
            .apply(
                &scope,
                vec![WriteOp::hard_delete(DOC, id, scope.project_id(), 1, Utc::now())],
            )
            .unwrap();

        assert!(store.get(&scope, DOC, id, true).unwrap().is_none());
    }

    #[test]
    fn list_filters_orders_and_paginates() {
        let store = InMemoryScopedStore::new();
        let scope = scope_for(ProjectId::new());
        let base = Utc::now();

        for i in 0..5i64 {
            let id = Uuid::now_v7();
            store
                .apply(
                    &scope,
                    vec![WriteOp::insert(
                        DOC,
                        id,
                        scope.project_id(),
                        base + Duration::seconds(i),
                        json!({"status": if i % 2 == 0 { "open" } else { "closed" }, "n": i}),
                    )],
                )
                .unwrap();
        }

        // Default order is newest first.
        let all = store.list(&scope, DOC, &ListQuery::default()).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].payload["n"], json!(4));

        let open = store
            .list(&scope, DOC, &ListQuery::new().with_filter("status", "open"))
            .unwrap();
        assert_eq!(open.len(), 3);

        let page = store
            .list(
                &scope,
                DOC,
                &ListQuery::new()
                    .with_order(SortOrder::CreatedAtAsc)
                    .with_offset(1)
                    .with_limit(2),
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].payload["n"], json!(1));
        assert_eq!(page[1].payload["n"], json!(2));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: for any row distribution across two projects, reads
        /// under one scope never surface the other project's rows.
        #[test]
        fn reads_never_cross_projects(n1 in 0usize..16, n2 in 0usize..16) {
            let store = InMemoryScopedStore::new();
            let p1 = scope_for(ProjectId::new());
            let p2 = scope_for(ProjectId::new());

            let mut p2_ids = Vec::new();
            for i in 0..n1 {
                insert_doc(&store, &p1, json!({"n": i}));
            }
            for i in 0..n2 {
                p2_ids.push(insert_doc(&store, &p2, json!({"n": i})));
            }

            let query = ListQuery::new().with_limit(64);
            prop_assert_eq!(store.count(&p1, DOC, &query).unwrap(), n1 as u64);
            let visible = store.list(&p1, DOC, &query).unwrap();
            prop_assert_eq!(visible.len(), n1);
            for envelope in &visible {
                prop_assert_eq!(envelope.project_id, p1.project_id());
            }

            // Even with p2's concrete ids in hand, p1 sees nothing.
            for id in p2_ids {
                prop_assert_eq!(store.get(&p1, DOC, id, true).unwrap(), None);
            }
        }
    }

    #[test]
    fn concurrent_cas_has_exactly_one_winner() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryScopedStore::new());
        let scope = scope_for(ProjectId::new());
        let id = insert_doc(&store, &scope, json!({"state": "bidding"}));

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            let scope = scope.clone();
            handles.push(thread::spawn(move || {
                store.apply(
                    &scope,
                    vec![WriteOp::put(
                        DOC,
                        id,
                        scope.project_id(),
                        1,
                        Utc::now(),
                        json!({"state": "awarded", "winner": i}),
                    )],
                )
            }));
        }

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        for outcome in outcomes.iter().filter(|r| r.is_err()) {
            assert_eq!(outcome.as_ref().unwrap_err().code(), "RFQ_LOCKED");
        }

        let row = store.get(&scope, DOC, id, false).unwrap().unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(row.payload["state"], json!("awarded"));
    }
}
