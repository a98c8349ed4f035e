//! Transition events and the sink they are published to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::ApplicationStatus;

/// Event type identifier for [`ApplicationTransitioned`].
pub const APPLICATION_TRANSITIONED_EVENT_TYPE: &str = "admissions.application_transitioned";

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for deserialization routing.
    pub event_type: String,
    /// Application this event belongs to.
    pub aggregate_id: Uuid,
    /// The application version the event describes.
    pub sequence_number: i64,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the command that caused it.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;
}

/// Emitted once per application whose status a transition wrote, including
/// every sibling rejected by cascade.
///
/// Delivery is at-least-once; consumers de-duplicate on
/// `(application_id, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTransitioned {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The application that changed.
    pub application_id: Uuid,
    /// The application's student.
    pub student_id: Uuid,
    /// The application's institution.
    pub institution_id: Uuid,
    /// Status before the write.
    pub from_status: ApplicationStatus,
    /// Status after the write.
    pub to_status: ApplicationStatus,
    /// Whether this was a cascade rejection rather than the requested
    /// transition.
    pub auto_rejected: bool,
    /// Version after the write.
    pub version: i64,
}

impl ApplicationTransitioned {
    /// When the transition was committed.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}

impl DomainEvent for ApplicationTransitioned {
    fn event_type(&self) -> &'static str {
        APPLICATION_TRANSITIONED_EVENT_TYPE
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(self).expect("ApplicationTransitioned serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Failure reported by an [`EventSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);

/// Downstream consumer of transition events (notifications, statistics).
///
/// Publishing happens after the store commit; a failure here never rolls
/// the commit back.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: &ApplicationTransitioned) -> Result<(), PublishError>;
}
