//! Resource capability declarations for project-scoped storage.
//!
//! The original platform modelled "project-scoped" and "soft-deletable" as
//! duck-typed mixins; here they are declared capabilities the scoped store
//! checks statically (associated consts) instead of probing at runtime.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::id::ProjectId;

/// A persistable, project-scoped resource.
///
/// Every workflow entity implements this; the scoped store uses the
/// declarations to key rows, enforce the project boundary structurally, and
/// decide which lifecycle operations the type supports.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Stable type discriminator used as part of the storage key
    /// (e.g. "rfq", "quote").
    const RESOURCE_TYPE: &'static str;

    /// Whether rows of this type may be soft-deleted.
    const SOFT_DELETE: bool = false;

    /// Whether rows of this type may be irreversibly hard-deleted.
    ///
    /// Workflow entities default to `false`: an RFQ is cancelled, never
    /// erased.
    const HARD_DELETE: bool = false;

    /// Raw identifier of this row.
    fn resource_id(&self) -> Uuid;

    /// Owning project. Immutable once set; the store rejects any update
    /// that changes it.
    fn project_id(&self) -> ProjectId;

    /// Creation time, used for default list ordering.
    fn created_at(&self) -> DateTime<Utc>;
}
