//! `procura-budget` — budget ceiling policy and spend tracking.
//!
//! The ledger itself is pure arithmetic over a snapshot the workflow engine
//! assembles inside the same transaction as the order transition it gates;
//! this crate never touches storage.

pub mod exception;
pub mod invoice;
pub mod ledger;

pub use exception::{BudgetException, BudgetExceptionId, BudgetExceptionStatus, ExceptionEvent};
pub use invoice::{Invoice, InvoiceEvent, InvoiceId, InvoiceStatus};
pub use ledger::BudgetSnapshot;
