//! Transactional outbox: stage during a transition, publish after commit.

use crate::envelope::EventEnvelope;
use crate::publisher::EventPublisher;

/// Collects the envelopes produced by one workflow transition.
///
/// Nothing leaves the outbox before the owning transaction commits. After
/// commit, [`EventOutbox::publish_all`] hands every envelope to the
/// publisher; failures are returned to the caller for logging. A publish
/// failure must never roll back the already-committed transaction.
#[derive(Debug, Default)]
pub struct EventOutbox {
    staged: Vec<EventEnvelope>,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, envelope: EventEnvelope) {
        self.staged.push(envelope);
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Publish every staged envelope, consuming the outbox.
    ///
    /// Returns the envelopes that failed to publish, so the caller can log
    /// them and leave redelivery to the external job runtime (events carry a
    /// correlation id and are idempotent on the consumer side).
    pub fn publish_all<P>(self, publisher: &P) -> Vec<EventEnvelope>
    where
        P: EventPublisher + ?Sized,
    {
        let mut failed = Vec::new();

        for envelope in self.staged {
            match publisher.publish(&envelope) {
                Ok(_) => {
                    tracing::debug!(
                        event_type = envelope.event_type(),
                        event_id = %envelope.event_id(),
                        correlation_id = %envelope.correlation_id(),
                        "domain event published"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        event_type = envelope.event_type(),
                        event_id = %envelope.event_id(),
                        correlation_id = %envelope.correlation_id(),
                        error = %err,
                        retriable = err.is_retriable(),
                        "domain event publish failed; leaving redelivery to the job runtime"
                    );
                    failed.push(envelope);
                }
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use procura_core::ProjectId;

    use crate::publisher::{Ack, PublishError};

    use super::*;

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(
            Uuid::now_v7(),
            ProjectId::new(),
            Uuid::now_v7(),
            event_type,
            1,
            Utc::now(),
            serde_json::json!({}),
        )
    }

    struct FailingPublisher;

    impl EventPublisher for FailingPublisher {
        fn publish(&self, _envelope: &EventEnvelope) -> Result<Ack, PublishError> {
            Err(PublishError::Retriable("broker unavailable".to_string()))
        }
    }

    #[test]
    fn staged_events_are_not_published_until_drained() {
        let publisher = crate::InMemoryEventPublisher::new();
        let mut outbox = EventOutbox::new();
        outbox.stage(envelope("rfq.published"));

        assert!(publisher.published().is_empty());

        let failed = outbox.publish_all(&publisher);
        assert!(failed.is_empty());
        assert_eq!(publisher.published_types(), vec!["rfq.published".to_string()]);
    }

    #[test]
    fn publish_failures_are_returned_not_raised() {
        let mut outbox = EventOutbox::new();
        outbox.stage(envelope("order.released"));
        outbox.stage(envelope("order.completed"));

        let failed = outbox.publish_all(&FailingPublisher);
        assert_eq!(failed.len(), 2);
    }
}
