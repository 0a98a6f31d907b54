//! Publish contract consumed by the workflow engine.
//!
//! Production implementations live outside this workspace (message broker,
//! job queue, webhook relay). The contract is deliberately small:
//! fire-and-forget post-commit, at-least-once, idempotent consumers.

use std::sync::Arc;

use thiserror::Error;

use crate::envelope::EventEnvelope;

/// Acknowledgement of an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Publish failure.
///
/// Retriable failures are re-driven by the external job runtime; they never
/// roll back the transaction that produced the event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("retriable publish failure: {0}")]
    Retriable(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

impl PublishError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

/// Domain event publisher (pub side only).
pub trait EventPublisher: Send + Sync {
    fn publish(&self, envelope: &EventEnvelope) -> Result<Ack, PublishError>;
}

impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    fn publish(&self, envelope: &EventEnvelope) -> Result<Ack, PublishError> {
        (**self).publish(envelope)
    }
}
