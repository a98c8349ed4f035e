//! The admission decision engine.
//!
//! The engine is the only writer of review fields. Each transition runs as:
//! read the application (and, for approvals, its competing set), plan the
//! writes, commit them as one version-checked multi-write, then publish one
//! event per written record. A version conflict at commit means another
//! writer got there first; the engine re-reads and re-plans, up to the retry
//! bound.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use admissions_core::application::ApplicationStatus;
use admissions_core::clock::Clock;
use admissions_core::error::DomainError;
use admissions_core::event::{ApplicationTransitioned, EventSink};
use admissions_core::store::{ApplicationStore, ConditionalWrite};

use crate::config::{EngineConfig, RetryPolicy};
use crate::domain::commands::TransitionApplication;
use crate::domain::transition::{self, PlannedChange, TransitionPlan, TransitionRequest};

/// Outcome of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionResult {
    /// `false` when the application was already in the requested status and
    /// nothing was written.
    pub applied: bool,
    /// Siblings rejected by cascade in the same commit.
    pub auto_rejected_count: usize,
}

impl TransitionResult {
    fn unchanged() -> Self {
        Self {
            applied: false,
            auto_rejected_count: 0,
        }
    }
}

/// A committed transition and the events still to publish.
#[derive(Debug)]
struct Committed {
    result: TransitionResult,
    events: Vec<ApplicationTransitioned>,
}

/// Enforces the review state machine and the one-admission-per-institution
/// invariant.
pub struct AdmissionDecisionEngine {
    store: Arc<dyn ApplicationStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for AdmissionDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionDecisionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdmissionDecisionEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            config,
        }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Moves one application to `command.target_status`.
    ///
    /// Approving an application rejects every other pending or under-review
    /// application of the same student at the same institution in the same
    /// commit. Requesting the status the application already has succeeds
    /// with `applied: false` and writes nothing.
    ///
    /// # Errors
    ///
    /// - `DomainError::ApplicationNotFound` for an unknown id.
    /// - `DomainError::Unauthorized` if the actor is not the owning institution.
    /// - `DomainError::Validation` for a `pending` target or a transition out
    ///   of a terminal status.
    /// - `DomainError::AlreadyAdmitted` if the student holds an admission at
    ///   this institution.
    /// - `DomainError::ConcurrencyConflict` if concurrent writers kept winning
    ///   after every retry.
    /// - `DomainError::StoreUnavailable` if the store stayed unreachable.
    /// - `DomainError::Timeout` if the deadline elapsed. A commit already in
    ///   flight still lands, all or nothing, and its events are still
    ///   published.
    #[instrument(
        skip(self, command),
        fields(
            application_id = %command.application_id,
            target_status = %command.target_status,
            correlation_id = %command.correlation_id,
        )
    )]
    pub async fn transition(
        &self,
        command: &TransitionApplication,
    ) -> Result<TransitionResult, DomainError> {
        let deadline = command.timeout.unwrap_or(self.config.transition_timeout);
        let committed = tokio::time::timeout(deadline, self.decide_and_commit(command))
            .await
            .map_err(|_| DomainError::Timeout {
                timeout_ms: duration_ms(deadline),
            })??;

        publish_all(self.sink.as_ref(), self.config.publish_timeout, &committed.events).await;
        Ok(committed.result)
    }

    async fn decide_and_commit(
        &self,
        command: &TransitionApplication,
    ) -> Result<Committed, DomainError> {
        let mut attempt = 1;
        loop {
            match self.attempt(command).await {
                Err(err) if err.is_retryable_conflict() && attempt < self.config.retry.max_attempts => {
                    let backoff = self.config.retry.backoff(attempt);
                    warn!(attempt, ?backoff, error = %err, "lost commit race, re-reading and retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn attempt(&self, command: &TransitionApplication) -> Result<Committed, DomainError> {
        let store = self.store.as_ref();
        let retry = &self.config.retry;
        let application_id = command.application_id;

        let application = retry
            .run("get", || store.get(application_id))
            .await?
            .ok_or(DomainError::ApplicationNotFound(application_id))?;
        transition::authorize(&application, command.actor_id)?;

        let needs_competing_set = command.target_status == ApplicationStatus::Approved
            && application.status != ApplicationStatus::Approved;
        let competing_set = if needs_competing_set {
            let (student_id, institution_id) = (application.student_id, application.institution_id);
            retry
                .run("query_by_student_and_institution", || {
                    store.query_by_student_and_institution(student_id, institution_id)
                })
                .await?
        } else {
            Vec::new()
        };
        // The competing-set read is the later one; decide on its copy.
        let current = competing_set
            .iter()
            .find(|member| member.id == application_id)
            .cloned()
            .unwrap_or(application);

        let now = self.clock.now();
        let plan = transition::plan_transition(
            &current,
            &competing_set,
            &TransitionRequest {
                target_status: command.target_status,
                actor_id: command.actor_id,
                notes: command.notes.as_deref(),
                now,
            },
        )?;

        let TransitionPlan::Commit { changes, .. } = &plan else {
            debug!(status = %current.status, "already in target status, nothing to write");
            return Ok(Committed {
                result: TransitionResult::unchanged(),
                events: Vec::new(),
            });
        };

        let events = changes
            .iter()
            .map(|change| change.to_event(command.correlation_id, now))
            .collect();
        let events = self.commit(plan.writes(), changes.clone(), events).await?;

        let auto_rejected_count = plan.auto_rejected_count();
        info!(
            from_status = %current.status,
            auto_rejected_count,
            "transition committed"
        );

        Ok(Committed {
            result: TransitionResult {
                applied: true,
                auto_rejected_count,
            },
            events,
        })
    }

    /// Runs the commit on its own task, so a caller whose deadline drops this
    /// future cannot cancel it halfway. If the caller is gone by the time the
    /// commit lands, the task publishes the events itself.
    async fn commit(
        &self,
        writes: Vec<ConditionalWrite>,
        changes: Vec<PlannedChange>,
        events: Vec<ApplicationTransitioned>,
    ) -> Result<Vec<ApplicationTransitioned>, DomainError> {
        let store = Arc::clone(&self.store);
        let sink = Arc::clone(&self.sink);
        let retry = self.config.retry;
        let publish_timeout = self.config.publish_timeout;
        let (ack, acknowledged) = oneshot::channel();

        tokio::spawn(
            async move {
                let outcome = commit_writes(store.as_ref(), retry, &writes, &changes)
                    .await
                    .map(|()| events);
                if let Err(Ok(orphaned)) = ack.send(outcome) {
                    warn!(
                        count = orphaned.len(),
                        "caller gave up before the commit finished, publishing from the commit task"
                    );
                    publish_all(sink.as_ref(), publish_timeout, &orphaned).await;
                }
            }
            .instrument(Span::current()),
        );

        acknowledged.await.map_err(|_| {
            DomainError::Infrastructure("commit task ended without reporting an outcome".to_owned())
        })?
    }
}

/// Issues the conditional multi-write, retrying transient failures.
///
/// A transient failure can hide a commit whose acknowledgement was lost. Before
/// re-issuing, the written records are re-read; if every planned change is
/// already in place the commit is taken as applied.
async fn commit_writes(
    store: &dyn ApplicationStore,
    retry: RetryPolicy,
    writes: &[ConditionalWrite],
    changes: &[PlannedChange],
) -> Result<(), DomainError> {
    let mut attempt = 1;
    loop {
        match store.conditional_multi_write(writes).await {
            Err(err) if err.is_transient() => {
                if changes_in_place(store, changes).await {
                    warn!(error = %err, "commit acknowledgement lost, writes found in place");
                    return Ok(());
                }
                if attempt >= retry.max_attempts {
                    return Err(err);
                }
                let backoff = retry.backoff(attempt);
                warn!(
                    operation = "conditional_multi_write",
                    attempt,
                    ?backoff,
                    error = %err,
                    "transient store failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn changes_in_place(store: &dyn ApplicationStore, changes: &[PlannedChange]) -> bool {
    for change in changes {
        match store.get(change.before.id).await {
            Ok(Some(current)) if change.is_reflected_in(&current) => {}
            _ => return false,
        }
    }
    true
}

/// Hands every event to the sink. Failures are logged and dropped: the
/// transition is already committed.
async fn publish_all(
    sink: &dyn EventSink,
    publish_timeout: Duration,
    events: &[ApplicationTransitioned],
) {
    for event in events {
        match tokio::time::timeout(publish_timeout, sink.publish(event)).await {
            Ok(Ok(())) => {
                debug!(application_id = %event.application_id, version = event.version, "event published");
            }
            Ok(Err(err)) => {
                warn!(
                    application_id = %event.application_id,
                    version = event.version,
                    error = %err,
                    "event publish failed"
                );
            }
            Err(_) => {
                warn!(
                    application_id = %event.application_id,
                    version = event.version,
                    timeout_ms = duration_ms(publish_timeout),
                    "event publish timed out"
                );
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
