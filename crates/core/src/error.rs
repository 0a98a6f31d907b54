//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (scoping,
/// state machines, budget policy). Infrastructure failures are mapped into
/// this taxonomy at the storage boundary; raw backend errors never cross it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Attempt to read or write outside the caller's project scope, or to
    /// mutate an immutable `project_id`. Fatal, never retried.
    #[error("scope violation: {0}")]
    ScopeViolation(String),

    /// Requested transition is not legal from the current state.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Order blocked by the project budget ceiling; recoverable through the
    /// budget-exception workflow.
    #[error("budget exceeded: remaining {remaining}")]
    BudgetExceeded { remaining: i64 },

    /// Access to supplier identity before the reveal point.
    #[error("anonymity violation: {0}")]
    AnonymityViolation(String),

    /// A concurrent transition won the race on this entity; retry with
    /// backoff against fresh state.
    #[error("entity locked by a concurrent transition: {0}")]
    Locked(String),

    /// Id absent, or present in a different project. The two cases are
    /// deliberately indistinguishable.
    #[error("not found")]
    NotFound,

    /// Operation not supported by this resource type (e.g. hard delete on
    /// an RFQ).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Authorization failure at the domain boundary (role guard).
    #[error("unauthorized")]
    Unauthorized,

    /// Storage-layer failure, already sanitized. Raw backend errors never
    /// reach callers.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn scope_violation(msg: impl Into<String>) -> Self {
        Self::ScopeViolation(msg.into())
    }

    pub fn invalid_transition(
        entity: &str,
        from: impl core::fmt::Display,
        to: impl core::fmt::Display,
    ) -> Self {
        Self::InvalidStateTransition(format!("{entity}: {from} -> {to}"))
    }

    pub fn budget_exceeded(remaining: i64) -> Self {
        Self::BudgetExceeded { remaining }
    }

    pub fn anonymity(msg: impl Into<String>) -> Self {
        Self::AnonymityViolation(msg.into())
    }

    pub fn locked(msg: impl Into<String>) -> Self {
        Self::Locked(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable machine-readable code for the user-visible error contract.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ScopeViolation(_) => "SCOPE_VIOLATION",
            Self::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::AnonymityViolation(_) => "ANONYMITY_VIOLATION",
            Self::Locked(_) => "RFQ_LOCKED",
            Self::NotFound => "NOT_FOUND",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::InvalidId(_) => "INVALID_ID",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::scope_violation("x").code(), "SCOPE_VIOLATION");
        assert_eq!(
            DomainError::invalid_transition("rfq", "draft", "awarded").code(),
            "INVALID_STATE_TRANSITION"
        );
        assert_eq!(DomainError::budget_exceeded(-10).code(), "BUDGET_EXCEEDED");
        assert_eq!(DomainError::locked("rfq").code(), "RFQ_LOCKED");
        assert_eq!(DomainError::not_found().code(), "NOT_FOUND");
    }

    #[test]
    fn not_found_carries_no_detail() {
        // Existence in another project must be indistinguishable from absence.
        assert_eq!(DomainError::not_found().to_string(), "not found");
    }
}
