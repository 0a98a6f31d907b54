use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for workflow guards.
///
/// Roles are intentionally opaque strings at this layer; mapping roles to
/// fine-grained permissions is the caller/policy layer's concern. The
/// constants below are the roles the procurement lifecycle itself cares
/// about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Customer-side buyer; creates and publishes RFQs.
    pub const BUYER: Role = Role(Cow::Borrowed("buyer"));

    /// Customer-side manager; triggers second-chance bidding, awards RFQs,
    /// requests budget exceptions.
    pub const PROCUREMENT_MANAGER: Role = Role(Cow::Borrowed("procurement_manager"));

    /// Decides budget exceptions. Never the requester role.
    pub const APPROVER: Role = Role(Cow::Borrowed("approver"));

    /// Supplier-side bidder; submits quotes.
    pub const SUPPLIER: Role = Role(Cow::Borrowed("supplier"));

    /// Platform operator.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_procurement_manager(&self) -> bool {
        *self == Self::PROCUREMENT_MANAGER || *self == Self::ADMIN
    }

    pub fn is_approver(&self) -> bool {
        *self == Self::APPROVER || *self == Self::ADMIN
    }

    pub fn is_supplier(&self) -> bool {
        *self == Self::SUPPLIER
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_inherits_manager_and_approver() {
        assert!(Role::ADMIN.is_procurement_manager());
        assert!(Role::ADMIN.is_approver());
        assert!(!Role::ADMIN.is_supplier());
    }

    #[test]
    fn custom_roles_grant_nothing() {
        let r = Role::new("auditor");
        assert!(!r.is_procurement_manager());
        assert!(!r.is_approver());
    }
}
