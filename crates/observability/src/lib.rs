//! Tracing and logging (shared setup).
//!
//! The isolation and anonymity layers rely on structured logs for their
//! audit lines (admin override reads, reveal events), so hosts should call
//! [`init`] before serving any scoped request.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
