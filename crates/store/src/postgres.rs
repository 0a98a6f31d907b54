//! Postgres-backed scoped store.
//!
//! Rows live in a single `scoped_records` table keyed by
//! `(resource_type, record_id)` with `project_id` indexed and the domain
//! payload as JSONB: the same envelope shape the in-memory backend keeps in
//! process memory.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to the domain taxonomy as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | DomainError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `Locked` | Concurrent insert of the same row |
//! | Database (other) | Any other | `Storage` | Constraint/database failure |
//! | PoolClosed / RowNotFound / other | N/A | `Storage` | Pool shutdown, network failures, etc. |
//!
//! Raw database messages never cross the domain boundary beyond the
//! sanitized `Storage` text.
//!
//! ## Concurrency
//!
//! `apply` runs one SQL transaction per batch. Every target row is read
//! `FOR UPDATE` before its version is checked, so two concurrent batches on
//! the same row serialize at the database; the loser observes a version
//! mismatch (or a unique violation on insert) and fails with `Locked`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use procura_auth::TenantScope;
use procura_core::{DomainError, DomainResult, ProjectId};

use crate::envelope::{RecordEnvelope, WriteAction, WriteOp};
use crate::query::{ListQuery, SortOrder};
use crate::scoped::{ScopedStore, audit_widened_read, check_write_scope};

const SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS scoped_records (
        resource_type TEXT        NOT NULL,
        record_id     UUID        NOT NULL,
        project_id    UUID        NOT NULL,
        version       BIGINT      NOT NULL,
        deleted_at    TIMESTAMPTZ,
        created_at    TIMESTAMPTZ NOT NULL,
        payload       JSONB       NOT NULL,
        PRIMARY KEY (resource_type, record_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_scoped_records_project
        ON scoped_records (project_id, resource_type)
    "#,
];

/// Postgres-backed scoped store.
///
/// Shares the SQLx pool (thread-safe); the sync [`ScopedStore`] impl bridges
/// into async via the ambient tokio runtime, like the rest of the platform's
/// storage adapters.
#[derive(Debug, Clone)]
pub struct PostgresScopedStore {
    pool: Arc<PgPool>,
}

impl PostgresScopedStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> DomainResult<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    fn push_scope_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        scope: &TenantScope,
        resource_type: &'a str,
        include_deleted: bool,
        operation: &str,
    ) {
        qb.push(" WHERE resource_type = ");
        qb.push_bind(resource_type.to_string());

        // The project predicate is structural; admin override is the only
        // widening path and is always audited.
        if scope.admin_override() {
            audit_widened_read(scope, resource_type, operation);
        } else {
            qb.push(" AND project_id = ");
            qb.push_bind(*scope.project_id().as_uuid());
        }

        if !include_deleted {
            qb.push(" AND deleted_at IS NULL");
        }
    }

    fn push_payload_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
        for (field, value) in &query.filters {
            qb.push(" AND payload -> ");
            qb.push_bind(field.clone());
            qb.push(" = ");
            qb.push_bind(value.clone());
        }
    }

    #[instrument(skip(self, scope), fields(project_id = %scope.project_id()), err)]
    pub async fn get_async(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<Option<RecordEnvelope>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT resource_type, record_id, project_id, version, deleted_at, created_at, payload \
             FROM scoped_records",
        );
        Self::push_scope_filters(&mut qb, scope, resource_type, include_deleted, "get");
        qb.push(" AND record_id = ");
        qb.push_bind(id);

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(envelope_from_row).transpose()
    }

    #[instrument(skip(self, scope, query), fields(project_id = %scope.project_id()), err)]
    pub async fn list_async(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<Vec<RecordEnvelope>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT resource_type, record_id, project_id, version, deleted_at, created_at, payload \
             FROM scoped_records",
        );
        Self::push_scope_filters(&mut qb, scope, resource_type, query.include_deleted, "list");
        Self::push_payload_filters(&mut qb, query);

        match query.order {
            SortOrder::CreatedAtDesc => qb.push(" ORDER BY created_at DESC, record_id DESC"),
            SortOrder::CreatedAtAsc => qb.push(" ORDER BY created_at ASC, record_id ASC"),
        };
        qb.push(" LIMIT ");
        qb.push_bind(query.limit.min(i64::MAX as usize) as i64);
        qb.push(" OFFSET ");
        qb.push_bind(query.offset.min(i64::MAX as usize) as i64);

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter().map(envelope_from_row).collect()
    }

    #[instrument(skip(self, scope, query), fields(project_id = %scope.project_id()), err)]
    pub async fn count_async(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<u64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM scoped_records");
        Self::push_scope_filters(&mut qb, scope, resource_type, query.include_deleted, "count");
        Self::push_payload_filters(&mut qb, query);

        let row = qb
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| DomainError::storage(format!("failed to read count: {e}")))?;
        Ok(total.max(0) as u64)
    }

    pub async fn exists_async(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<bool> {
        Ok(self
            .get_async(scope, resource_type, id, include_deleted)
            .await?
            .is_some())
    }

    /// Apply one batch inside one SQL transaction.
    ///
    /// Early returns drop the transaction, which rolls it back; nothing is
    /// visible unless the final commit succeeds.
    #[instrument(
        skip(self, scope, batch),
        fields(project_id = %scope.project_id(), ops = batch.len()),
        err
    )]
    pub async fn apply_async(
        &self,
        scope: &TenantScope,
        batch: Vec<WriteOp>,
    ) -> DomainResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        for op in &batch {
            check_write_scope(scope, op)?;

            let row = sqlx::query(
                "SELECT project_id, version FROM scoped_records \
                 WHERE resource_type = $1 AND record_id = $2 FOR UPDATE",
            )
            .bind(op.resource_type)
            .bind(op.record_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_row", e))?;

            match (&row, op.expected_version) {
                (Some(_), 0) => {
                    return Err(DomainError::locked(format!(
                        "insert conflict for {}/{}",
                        op.resource_type, op.record_id
                    )));
                }
                (None, 0) => {
                    let WriteAction::Put { payload } = &op.action else {
                        return Err(DomainError::validation(
                            "only a put can target a non-existing row",
                        ));
                    };

                    sqlx::query(
                        "INSERT INTO scoped_records \
                         (resource_type, record_id, project_id, version, deleted_at, created_at, payload) \
                         VALUES ($1, $2, $3, 1, NULL, $4, $5)",
                    )
                    .bind(op.resource_type)
                    .bind(op.record_id)
                    .bind(*op.project_id.as_uuid())
                    .bind(op.created_at)
                    .bind(payload.clone())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("insert", e))?;
                }
                (None, _) => {
                    return Err(DomainError::locked(format!(
                        "row {}/{} was removed by a concurrent transition",
                        op.resource_type, op.record_id
                    )));
                }
                (Some(row), expected) => {
                    let project: Uuid = row
                        .try_get("project_id")
                        .map_err(|e| DomainError::storage(format!("failed to read project_id: {e}")))?;
                    if ProjectId::from_uuid(project) != op.project_id {
                        return Err(DomainError::not_found());
                    }

                    let version: i64 = row
                        .try_get("version")
                        .map_err(|e| DomainError::storage(format!("failed to read version: {e}")))?;
                    if version.max(0) as u64 != expected {
                        return Err(DomainError::locked(format!(
                            "version conflict for {}/{} (expected {}, found {})",
                            op.resource_type, op.record_id, expected, version
                        )));
                    }

                    match &op.action {
                        WriteAction::Put { payload } => {
                            sqlx::query(
                                "UPDATE scoped_records SET payload = $3, version = $4 \
                                 WHERE resource_type = $1 AND record_id = $2",
                            )
                            .bind(op.resource_type)
                            .bind(op.record_id)
                            .bind(payload.clone())
                            .bind((expected + 1) as i64)
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| map_sqlx_error("update", e))?;
                        }
                        WriteAction::SoftDelete { deleted_at } => {
                            sqlx::query(
                                "UPDATE scoped_records SET deleted_at = $3, version = $4 \
                                 WHERE resource_type = $1 AND record_id = $2",
                            )
                            .bind(op.resource_type)
                            .bind(op.record_id)
                            .bind(*deleted_at)
                            .bind((expected + 1) as i64)
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| map_sqlx_error("soft_delete", e))?;
                        }
                        WriteAction::HardDelete => {
                            sqlx::query(
                                "DELETE FROM scoped_records \
                                 WHERE resource_type = $1 AND record_id = $2",
                            )
                            .bind(op.resource_type)
                            .bind(op.record_id)
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| map_sqlx_error("hard_delete", e))?;
                        }
                    }
                }
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    fn runtime_handle() -> DomainResult<tokio::runtime::Handle> {
        tokio::runtime::Handle::try_current().map_err(|_| {
            DomainError::storage(
                "PostgresScopedStore requires an async runtime (tokio); \
                 call from within a tokio runtime context",
            )
        })
    }
}

impl ScopedStore for PostgresScopedStore {
    fn get(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<Option<RecordEnvelope>> {
        let handle = Self::runtime_handle()?;
        handle.block_on(self.get_async(scope, resource_type, id, include_deleted))
    }

    fn list(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<Vec<RecordEnvelope>> {
        let handle = Self::runtime_handle()?;
        handle.block_on(self.list_async(scope, resource_type, query))
    }

    fn count(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        query: &ListQuery,
    ) -> DomainResult<u64> {
        let handle = Self::runtime_handle()?;
        handle.block_on(self.count_async(scope, resource_type, query))
    }

    fn exists(
        &self,
        scope: &TenantScope,
        resource_type: &str,
        id: Uuid,
        include_deleted: bool,
    ) -> DomainResult<bool> {
        let handle = Self::runtime_handle()?;
        handle.block_on(self.exists_async(scope, resource_type, id, include_deleted))
    }

    fn apply(&self, scope: &TenantScope, batch: Vec<WriteOp>) -> DomainResult<()> {
        let handle = Self::runtime_handle()?;
        handle.block_on(self.apply_async(scope, batch))
    }
}

fn envelope_from_row(row: &PgRow) -> DomainResult<RecordEnvelope> {
    let read = |e: sqlx::Error| DomainError::storage(format!("failed to read record row: {e}"));

    let version: i64 = row.try_get("version").map_err(read)?;
    let project_id: Uuid = row.try_get("project_id").map_err(read)?;
    let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at").map_err(read)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    Ok(RecordEnvelope {
        resource_type: row.try_get("resource_type").map_err(read)?,
        record_id: row.try_get("record_id").map_err(read)?,
        project_id: ProjectId::from_uuid(project_id),
        version: version.max(0) as u64,
        deleted_at,
        created_at,
        payload: row.try_get("payload").map_err(read)?,
    })
}

/// Map SQLx errors into the domain taxonomy (sanitized).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: a concurrent batch inserted the row first.
                Some("23505") => DomainError::locked(msg),
                _ => DomainError::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::storage(format!("connection pool closed in {operation}"))
        }
        other => DomainError::storage(format!("sqlx error in {operation}: {other}")),
    }
}
