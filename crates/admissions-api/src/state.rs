//! Shared application state.

use std::sync::Arc;

use admissions_core::clock::Clock;
use admissions_core::event::EventSink;
use admissions_core::store::ApplicationStore;
use admissions_decision::application::bulk::BulkTransitionCoordinator;
use admissions_decision::application::engine::AdmissionDecisionEngine;
use admissions_decision::config::EngineConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock used for submissions.
    pub clock: Arc<dyn Clock>,
    /// Application store, for submissions and read views.
    pub store: Arc<dyn ApplicationStore>,
    /// Single-application transitions.
    pub engine: Arc<AdmissionDecisionEngine>,
    /// Bulk transitions.
    pub bulk: BulkTransitionCoordinator,
}

impl AppState {
    /// Create new application state; the engine and the bulk coordinator
    /// share `store`, `sink` and `clock`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let engine = Arc::new(AdmissionDecisionEngine::new(
            Arc::clone(&store),
            sink,
            Arc::clone(&clock),
            config,
        ));
        Self {
            clock,
            store,
            bulk: BulkTransitionCoordinator::new(Arc::clone(&engine)),
            engine,
        }
    }
}
