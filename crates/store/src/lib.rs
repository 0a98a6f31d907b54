//! `procura-store` — project-scoped data access.
//!
//! Every read and write is parameterized by a [`procura_auth::TenantScope`];
//! the project filter is a structural part of the lookup path, not an
//! optional clause. There is no code path that produces an unscoped query
//! for a project-scoped resource.
//!
//! Two layers:
//! - the dyn-safe [`ScopedStore`] backend trait over [`RecordEnvelope`] rows
//!   (JSON payload + scoping/version metadata), with in-memory and Postgres
//!   implementations;
//! - the typed [`ScopedRepository`] consumed by domain code, which adds
//!   capability checks (soft/hard delete), project-immutability enforcement
//!   and (de)serialization.
//!
//! Writes travel as atomic compare-and-swap batches ([`WriteOp`]); one batch
//! is one logical transaction. A version mismatch anywhere in the batch
//! fails the whole batch and nothing is applied.

pub mod envelope;
pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod repository;
pub mod scoped;

pub use envelope::{RecordEnvelope, Versioned, WriteAction, WriteOp};
pub use in_memory::InMemoryScopedStore;
pub use postgres::PostgresScopedStore;
pub use query::{ListQuery, SortOrder};
pub use repository::ScopedRepository;
pub use scoped::ScopedStore;
