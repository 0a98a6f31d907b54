//! Value object marker + shared value types.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Marker trait for immutable values compared by value (not identity).
pub trait ValueObject: Clone + PartialEq {}

/// ISO-4217 style currency code.
///
/// Opaque at this layer; arithmetic never mixes currencies because amounts
/// only ever meet inside a single project, which carries one currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(Cow<'static, str>);

impl Currency {
    pub const USD: Currency = Currency(Cow::Borrowed("USD"));
    pub const EUR: Currency = Currency(Cow::Borrowed("EUR"));

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Currency {}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
