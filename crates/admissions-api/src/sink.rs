//! Default event sink: structured log lines.

use admissions_core::event::{ApplicationTransitioned, DomainEvent, EventSink, PublishError};
use async_trait::async_trait;
use tracing::info;

/// Publishes every transition as an `info` event on the `admissions::events`
/// target, for a log shipper to forward.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &ApplicationTransitioned) -> Result<(), PublishError> {
        let metadata = event.metadata();
        info!(
            target: "admissions::events",
            event_type = event.event_type(),
            event_id = %metadata.event_id,
            correlation_id = %metadata.correlation_id,
            application_id = %event.application_id,
            to_status = %event.to_status,
            version = event.version,
            payload = %event.to_payload(),
            "application transitioned"
        );
        Ok(())
    }
}
