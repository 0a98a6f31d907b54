use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use procura_core::{DomainError, DomainResult, ProjectId};

use crate::event::DomainEvent;

/// Envelope for a domain event: project scope + delivery metadata.
///
/// This is the unit handed to the publisher. The `correlation_id` ties the
/// event back to the transition that produced it so the external job runtime
/// can retry delivery idempotently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    project_id: ProjectId,
    correlation_id: Uuid,

    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    payload: JsonValue,
}

impl EventEnvelope {
    pub fn new(
        event_id: Uuid,
        project_id: ProjectId,
        correlation_id: Uuid,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id,
            project_id,
            correlation_id,
            event_type: event_type.into(),
            event_version,
            occurred_at,
            payload,
        }
    }

    /// Wrap a typed domain event, serializing it as the payload.
    pub fn from_typed<E>(
        project_id: ProjectId,
        correlation_id: Uuid,
        event: &E,
    ) -> DomainResult<Self>
    where
        E: DomainEvent + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            DomainError::validation(format!("event payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            project_id,
            correlation_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }
}
