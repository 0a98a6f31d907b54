//! `procura-auth` — authorization boundary objects.
//!
//! Defines the immutable tenant scope threaded through every data-access and
//! workflow call, and the opaque role identifiers workflow guards check.
//! Construction happens once per request/job in the host's auth layer; this
//! crate trusts that layer for identity and enforces nothing but shape.

pub mod roles;
pub mod scope;

pub use roles::Role;
pub use scope::TenantScope;
