//! Bulk transitions.
//!
//! Each id is an independent transition: one failure does not stop or undo
//! the others. Ids are processed in request order, so two ids from the same
//! competing set resolve deterministically (the first approval wins).

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use admissions_core::application::ApplicationStatus;
use admissions_core::error::DomainError;

use crate::application::engine::AdmissionDecisionEngine;
use crate::domain::commands::TransitionApplications;

/// Why one item of a bulk request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    /// The application that failed.
    pub application_id: Uuid,
    /// Machine-readable reason, e.g. `already-admitted`.
    pub reason: &'static str,
    /// Human-readable detail.
    pub message: String,
}

/// Per-item outcome of a bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    /// Ids whose transition succeeded, no-ops included.
    pub succeeded: Vec<Uuid>,
    /// Ids whose transition failed.
    pub failed: Vec<BulkFailure>,
}

/// Applies one transition to many applications.
#[derive(Debug, Clone)]
pub struct BulkTransitionCoordinator {
    engine: Arc<AdmissionDecisionEngine>,
}

impl BulkTransitionCoordinator {
    /// Creates a coordinator on top of `engine`.
    #[must_use]
    pub fn new(engine: Arc<AdmissionDecisionEngine>) -> Self {
        Self { engine }
    }

    /// Transitions every id in `command.application_ids`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` without touching any application if
    /// the request itself is invalid: a `pending` target or more ids than
    /// `EngineConfig::max_bulk_size`. Per-item failures are reported in
    /// [`BulkResult::failed`], never as an `Err`.
    #[instrument(
        skip(self, command),
        fields(
            target_status = %command.target_status,
            item_count = command.application_ids.len(),
            correlation_id = %command.correlation_id,
        )
    )]
    pub async fn transition_many(
        &self,
        command: &TransitionApplications,
    ) -> Result<BulkResult, DomainError> {
        if command.target_status == ApplicationStatus::Pending {
            return Err(DomainError::Validation(
                "applications cannot be moved back to pending".to_owned(),
            ));
        }
        let max = self.engine.config().max_bulk_size;
        if command.application_ids.len() > max {
            return Err(DomainError::Validation(format!(
                "bulk request of {} applications exceeds the limit of {max}",
                command.application_ids.len()
            )));
        }

        let mut result = BulkResult::default();
        for &application_id in &command.application_ids {
            match self.engine.transition(&command.item(application_id)).await {
                Ok(_) => result.succeeded.push(application_id),
                Err(err) => {
                    warn!(%application_id, reason = err.code(), error = %err, "bulk item failed");
                    result.failed.push(BulkFailure {
                        application_id,
                        reason: err.code(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "bulk transition finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use admissions_core::application::{Application, ApplicationStatus};
    use admissions_core::error::DomainError;
    use admissions_test_support::{FixedClock, InMemoryApplicationStore, RecordingEventSink};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::BulkTransitionCoordinator;
    use crate::application::engine::AdmissionDecisionEngine;
    use crate::config::{EngineConfig, RetryPolicy};
    use crate::domain::commands::TransitionApplications;

    fn submitted(student_id: Uuid, institution_id: Uuid) -> Application {
        Application::submitted(
            Uuid::new_v4(),
            student_id,
            institution_id,
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        )
    }

    fn coordinator(store: Arc<InMemoryApplicationStore>) -> BulkTransitionCoordinator {
        let config = EngineConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                base_backoff: Duration::from_millis(1),
            },
            max_bulk_size: 3,
            ..EngineConfig::default()
        };
        let engine = AdmissionDecisionEngine::new(
            store,
            Arc::new(RecordingEventSink::new()),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap())),
            config,
        );
        BulkTransitionCoordinator::new(Arc::new(engine))
    }

    fn approve_all(application_ids: Vec<Uuid>, actor_id: Uuid) -> TransitionApplications {
        TransitionApplications {
            correlation_id: Uuid::new_v4(),
            application_ids,
            target_status: ApplicationStatus::Approved,
            actor_id,
            notes: Some("batch admission".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_items_in_different_competing_sets_succeed_independently() {
        // Arrange
        let institution = Uuid::new_v4();
        let id1 = submitted(Uuid::new_v4(), institution);
        let id2 = submitted(Uuid::new_v4(), institution);
        let store = Arc::new(InMemoryApplicationStore::with_applications([
            id1.clone(),
            id2.clone(),
        ]));

        // Act
        let result = coordinator(store.clone())
            .transition_many(&approve_all(vec![id1.id, id2.id], institution))
            .await
            .unwrap();

        // Assert
        assert_eq!(result.succeeded, vec![id1.id, id2.id]);
        assert!(result.failed.is_empty());
        assert_eq!(store.snapshot(id2.id).unwrap().status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_one_conflicting_item_does_not_abort_the_others() {
        // Arrange
        let institution = Uuid::new_v4();
        let second_student = Uuid::new_v4();
        let id1 = submitted(Uuid::new_v4(), institution);
        let id2 = submitted(second_student, institution);
        let already_admitted = Application {
            status: ApplicationStatus::Approved,
            version: 1,
            ..submitted(second_student, institution)
        };
        let store = Arc::new(InMemoryApplicationStore::with_applications([
            id1.clone(),
            id2.clone(),
            already_admitted,
        ]));

        // Act
        let result = coordinator(store.clone())
            .transition_many(&approve_all(vec![id1.id, id2.id], institution))
            .await
            .unwrap();

        // Assert
        assert_eq!(result.succeeded, vec![id1.id]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].application_id, id2.id);
        assert_eq!(result.failed[0].reason, "already-admitted");
        assert_eq!(store.snapshot(id1.id).unwrap().status, ApplicationStatus::Approved);
        assert_eq!(store.snapshot(id2.id).unwrap(), id2);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_reported_per_item() {
        let institution = Uuid::new_v4();
        let known = submitted(Uuid::new_v4(), institution);
        let missing = Uuid::new_v4();
        let store = Arc::new(InMemoryApplicationStore::with_applications([known.clone()]));

        let result = coordinator(store)
            .transition_many(&TransitionApplications {
                target_status: ApplicationStatus::Rejected,
                ..approve_all(vec![missing, known.id], institution)
            })
            .await
            .unwrap();

        assert_eq!(result.succeeded, vec![known.id]);
        assert_eq!(result.failed[0].application_id, missing);
        assert_eq!(result.failed[0].reason, "not-found");
    }

    #[tokio::test]
    async fn test_siblings_in_one_batch_first_approval_wins() {
        let student = Uuid::new_v4();
        let institution = Uuid::new_v4();
        let first = submitted(student, institution);
        let second = submitted(student, institution);
        let store = Arc::new(InMemoryApplicationStore::with_applications([
            first.clone(),
            second.clone(),
        ]));

        let result = coordinator(store.clone())
            .transition_many(&approve_all(vec![first.id, second.id], institution))
            .await
            .unwrap();

        assert_eq!(result.succeeded, vec![first.id]);
        assert_eq!(result.failed[0].application_id, second.id);
        assert_eq!(result.failed[0].reason, "already-admitted");
        assert_eq!(store.snapshot(second.id).unwrap().status, ApplicationStatus::Rejected);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected_before_any_write() {
        let institution = Uuid::new_v4();
        let apps: Vec<Application> = (0..4).map(|_| submitted(Uuid::new_v4(), institution)).collect();
        let ids = apps.iter().map(|app| app.id).collect();
        let store = Arc::new(InMemoryApplicationStore::with_applications(apps));

        let result = coordinator(store.clone())
            .transition_many(&approve_all(ids, institution))
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.committed_writes(), 0);
    }

    #[tokio::test]
    async fn test_pending_target_is_rejected_for_the_whole_batch() {
        let store = Arc::new(InMemoryApplicationStore::new());

        let result = coordinator(store)
            .transition_many(&TransitionApplications {
                target_status: ApplicationStatus::Pending,
                ..approve_all(vec![Uuid::new_v4()], Uuid::new_v4())
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
