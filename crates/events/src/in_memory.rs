//! In-memory publisher for tests/dev.

use std::sync::{Mutex, mpsc};
use std::time::Duration;

use crate::envelope::EventEnvelope;
use crate::publisher::{Ack, EventPublisher, PublishError};

/// A subscription to published events.
///
/// Each subscription gets a copy of every event published after it was
/// created (broadcast semantics). Designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<EventEnvelope>,
}

impl Subscription {
    /// Block until the next event is available.
    pub fn recv(&self) -> Result<EventEnvelope, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Result<EventEnvelope, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<EventEnvelope, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// In-memory publisher.
///
/// - No IO / no async
/// - Best-effort fan-out to subscribers
/// - Records everything it accepted, so tests can assert on the exact
///   post-commit event stream
#[derive(Debug, Default)]
pub struct InMemoryEventPublisher {
    published: Mutex<Vec<EventEnvelope>>,
    subscribers: Mutex<Vec<mpsc::Sender<EventEnvelope>>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription { receiver: rx }
    }

    /// Everything accepted so far, in publish order.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Event types accepted so far, in publish order.
    pub fn published_types(&self) -> Vec<String> {
        self.published()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }
}

impl EventPublisher for InMemoryEventPublisher {
    fn publish(&self, envelope: &EventEnvelope) -> Result<Ack, PublishError> {
        let mut published = self
            .published
            .lock()
            .map_err(|_| PublishError::Retriable("publisher lock poisoned".to_string()))?;
        published.push(envelope.clone());

        if let Ok(mut subs) = self.subscribers.lock() {
            // Drop any dead subscribers while publishing.
            subs.retain(|tx| tx.send(envelope.clone()).is_ok());
        }

        Ok(Ack)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use procura_core::ProjectId;

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

    #[test]
    fn records_published_events_in_order() {
        let publisher = InMemoryEventPublisher::new();
        publisher.publish(&envelope("rfq.published")).unwrap();
        publisher.publish(&envelope("rfq.awarded")).unwrap();

        assert_eq!(
            publisher.published_types(),
            vec!["rfq.published".to_string(), "rfq.awarded".to_string()]
        );
    }

    #[test]
    fn fans_out_to_subscribers() {
        let publisher = InMemoryEventPublisher::new();
        let sub = publisher.subscribe();

        publisher.publish(&envelope("order.signed")).unwrap();

        let received = sub.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(received.event_type(), "order.signed");
    }
}
