//! `procura-events` — domain events and the publish contract.
//!
//! Events describe committed workflow facts. They are staged during a
//! transaction (outbox) and handed to the [`EventPublisher`] only after the
//! transaction commits; delivery retries belong to the external job runtime.

pub mod envelope;
pub mod event;
pub mod in_memory;
pub mod outbox;
pub mod publisher;

pub use envelope::EventEnvelope;
pub use event::DomainEvent;
pub use in_memory::InMemoryEventPublisher;
pub use outbox::EventOutbox;
pub use publisher::{Ack, EventPublisher, PublishError};
