//! `procura-orders` — order domain model.
//!
//! An order exists only as the outcome of an RFQ award. Its state machine
//! gates signature (contract requirement), release (budget check, done by
//! the engine), and the delivery chain.

pub mod contract;
pub mod order;

pub use contract::{Contract, ContractId};
pub use order::{Order, OrderEvent, OrderId, OrderStatus};
