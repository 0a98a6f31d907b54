use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use procura_core::ProjectId;

/// Storage row wrapping a resource payload with scoping metadata.
///
/// The payload is the serialized domain record; everything the store needs
/// for isolation, soft delete and optimistic concurrency lives in the
/// envelope columns, never inside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub resource_type: String,
    pub record_id: Uuid,
    pub project_id: ProjectId,

    /// Monotonically increasing row version; 1 on insert, +1 per write.
    pub version: u64,

    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl RecordEnvelope {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A decoded record together with the row version it was read at.
///
/// Transitions load these, decide on copies, and stage writes expecting the
/// same version; the loser of a concurrent race fails its CAS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<R> {
    pub record: R,
    pub version: u64,
}

/// What a write op does to its target row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    /// Insert or replace the payload (insert when `expected_version` is 0).
    Put { payload: JsonValue },
    /// Set the deletion marker, keeping the payload.
    SoftDelete { deleted_at: DateTime<Utc> },
    /// Irreversibly remove the row.
    HardDelete,
}

/// One compare-and-swap write inside a batch.
///
/// `expected_version == 0` means "the row must not exist" (insert); any
/// other value must match the current row version exactly. A batch is
/// applied all-or-nothing: one mismatch fails everything with the
/// lock-conflict error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub resource_type: &'static str,
    pub record_id: Uuid,
    pub project_id: ProjectId,
    pub expected_version: u64,
    pub created_at: DateTime<Utc>,
    pub action: WriteAction,
}

impl WriteOp {
    pub fn insert(
        resource_type: &'static str,
        record_id: Uuid,
        project_id: ProjectId,
        created_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            resource_type,
            record_id,
            project_id,
            expected_version: 0,
            created_at,
            action: WriteAction::Put { payload },
        }
    }

    pub fn put(
        resource_type: &'static str,
        record_id: Uuid,
        project_id: ProjectId,
        expected_version: u64,
        created_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            resource_type,
            record_id,
            project_id,
            expected_version,
            created_at,
            action: WriteAction::Put { payload },
        }
    }

    pub fn soft_delete(
        resource_type: &'static str,
        record_id: Uuid,
        project_id: ProjectId,
        expected_version: u64,
        created_at: DateTime<Utc>,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_type,
            record_id,
            project_id,
            expected_version,
            created_at,
            action: WriteAction::SoftDelete { deleted_at },
        }
    }

    pub fn hard_delete(
        resource_type: &'static str,
        record_id: Uuid,
        project_id: ProjectId,
        expected_version: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_type,
            record_id,
            project_id,
            expected_version,
            created_at,
            action: WriteAction::HardDelete,
        }
    }
}
