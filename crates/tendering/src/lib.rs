//! `procura-tendering` — RFQ and Quote domain model.
//!
//! The RFQ state machine and the quote revision rules live here as pure
//! decision logic; orchestration (transactions, events, budget checks)
//! belongs to the workflow engine.

pub mod quote;
pub mod rfq;

pub use quote::{Quote, QuoteDetails, QuoteEvent, QuoteId, QuoteStatus};
pub use rfq::{Rfq, RfqEvent, RfqId, RfqStatus};
