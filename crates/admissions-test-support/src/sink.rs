//! Test sinks — `EventSink` implementations for tests.

use std::sync::Mutex;
use std::time::Duration;

use admissions_core::event::{ApplicationTransitioned, EventSink, PublishError};
use async_trait::async_trait;

/// An event sink that records every published event.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    published: Mutex<Vec<ApplicationTransitioned>>,
}

impl RecordingEventSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published events, in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<ApplicationTransitioned> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: &ApplicationTransitioned) -> Result<(), PublishError> {
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// An event sink that rejects every event.
#[derive(Debug)]
pub struct FailingEventSink;

#[async_trait]
impl EventSink for FailingEventSink {
    async fn publish(&self, _event: &ApplicationTransitioned) -> Result<(), PublishError> {
        Err(PublishError("broker unreachable".into()))
    }
}

/// An event sink that sleeps before accepting each event.
#[derive(Debug)]
pub struct SlowEventSink(pub Duration);

#[async_trait]
impl EventSink for SlowEventSink {
    async fn publish(&self, _event: &ApplicationTransitioned) -> Result<(), PublishError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
