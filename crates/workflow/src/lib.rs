//! `procura-workflow` — transition orchestration.
//!
//! The engine owns the RFQ and Order state machines end to end: it loads
//! versioned rows through the scoped repositories, runs the pure domain
//! guards, stages every changed row into one compare-and-swap batch, applies
//! it atomically, and only then hands the transition's domain event to the
//! publisher. A concurrent transition on the same entity loses the CAS race
//! and surfaces as `RFQ_LOCKED`; nothing is ever partially applied.

pub mod budget_flows;
pub mod engine;
pub mod order_flows;
pub mod repos;
pub mod rfq_flows;
pub mod views;

pub use engine::WorkflowEngine;
pub use repos::ProcurementRepos;
pub use rfq_flows::{AwardRfq, CreateRfq, NewProject, SubmitQuote};
pub use budget_flows::RequestBudgetException;
