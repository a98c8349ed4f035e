//! The review state machine.
//!
//! Planning is pure: given the application, its competing set as read from
//! the store, and the request, it decides what to write. It never performs
//! I/O, so the engine can re-run it against a fresh read after a version
//! conflict.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use admissions_core::application::{Application, ApplicationStatus, StatusUpdate};
use admissions_core::error::DomainError;
use admissions_core::event::{APPLICATION_TRANSITIONED_EVENT_TYPE, ApplicationTransitioned, EventMetadata};
use admissions_core::store::ConditionalWrite;

/// Review note written on every cascade rejection.
pub const AUTO_REJECT_NOTE: &str =
    "auto-rejected: student admitted to another program at this institution";

/// Namespace for transition event ids.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6a0f_3c2e_9b41_4d7a_8e55_1f2b_c3d4_e5f6);

/// Id of the event for `application_id` reaching `version`. Stable, so a
/// re-published event keeps its id.
#[must_use]
pub fn event_id(application_id: Uuid, version: i64) -> Uuid {
    let mut name = [0_u8; 24];
    name[..16].copy_from_slice(application_id.as_bytes());
    name[16..].copy_from_slice(&version.to_be_bytes());
    Uuid::new_v5(&EVENT_ID_NAMESPACE, &name)
}

/// The caller's side of a transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest<'a> {
    /// The requested status.
    pub target_status: ApplicationStatus,
    /// The reviewing institution.
    pub actor_id: Uuid,
    /// Reviewer notes.
    pub notes: Option<&'a str>,
    /// Decision timestamp.
    pub now: DateTime<Utc>,
}

/// One status write the engine will commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// The record as read.
    pub before: Application,
    /// The fields to write.
    pub update: StatusUpdate,
    /// Whether this is a cascade rejection.
    pub auto_rejected: bool,
}

impl PlannedChange {
    /// The version the record holds once the change commits.
    #[must_use]
    pub fn committed_version(&self) -> i64 {
        self.before.version + 1
    }

    /// Whether `current`, as read back from the store, is this change
    /// committed.
    #[must_use]
    pub fn is_reflected_in(&self, current: &Application) -> bool {
        current.id == self.before.id
            && current.version == self.committed_version()
            && current.status == self.update.status
            && current.reviewed_by == Some(self.update.reviewed_by)
            && current.review_notes == self.update.review_notes
    }

    /// The event describing this change.
    #[must_use]
    pub fn to_event(&self, correlation_id: Uuid, occurred_at: DateTime<Utc>) -> ApplicationTransitioned {
        ApplicationTransitioned {
            metadata: EventMetadata {
                event_id: event_id(self.before.id, self.committed_version()),
                event_type: APPLICATION_TRANSITIONED_EVENT_TYPE.to_owned(),
                aggregate_id: self.before.id,
                sequence_number: self.committed_version(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at,
            },
            application_id: self.before.id,
            student_id: self.before.student_id,
            institution_id: self.before.institution_id,
            from_status: self.before.status,
            to_status: self.update.status,
            auto_rejected: self.auto_rejected,
            version: self.committed_version(),
        }
    }
}

/// Outcome of planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// The application is already in the requested status; nothing is written.
    NoOp,
    /// Writes to commit atomically.
    Commit {
        /// The requested change first, then cascade rejections.
        changes: Vec<PlannedChange>,
        /// Competing-set members read but not written; their versions are
        /// still checked at commit time.
        guards: Vec<(Uuid, i64)>,
    },
}

impl TransitionPlan {
    /// The conditional multi-write that commits this plan.
    #[must_use]
    pub fn writes(&self) -> Vec<ConditionalWrite> {
        match self {
            Self::NoOp => Vec::new(),
            Self::Commit { changes, guards } => changes
                .iter()
                .map(|change| {
                    ConditionalWrite::update(
                        change.before.id,
                        change.before.version,
                        change.update.clone(),
                    )
                })
                .chain(
                    guards
                        .iter()
                        .map(|&(id, version)| ConditionalWrite::guard(id, version)),
                )
                .collect(),
        }
    }

    /// Number of siblings this plan rejects by cascade.
    #[must_use]
    pub fn auto_rejected_count(&self) -> usize {
        match self {
            Self::NoOp => 0,
            Self::Commit { changes, .. } => {
                changes.iter().filter(|change| change.auto_rejected).count()
            }
        }
    }
}

/// Fails closed unless the actor is the institution that owns the application.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` on mismatch.
pub fn authorize(application: &Application, actor_id: Uuid) -> Result<(), DomainError> {
    if application.institution_id == actor_id {
        Ok(())
    } else {
        Err(DomainError::Unauthorized {
            actor_id,
            institution_id: application.institution_id,
        })
    }
}

/// Decides what a transition writes.
///
/// `competing_set` is only consulted for approvals and may include
/// `application` itself.
///
/// # Errors
///
/// - `DomainError::Unauthorized` if the actor does not own the application.
/// - `DomainError::Validation` for a `pending` target or a transition out of
///   a terminal status.
/// - `DomainError::AlreadyAdmitted` if another member of the competing set
///   is approved.
pub fn plan_transition(
    application: &Application,
    competing_set: &[Application],
    request: &TransitionRequest<'_>,
) -> Result<TransitionPlan, DomainError> {
    authorize(application, request.actor_id)?;

    match request.target_status {
        ApplicationStatus::Pending => Err(DomainError::Validation(
            "applications cannot be moved back to pending".to_owned(),
        )),
        target if application.status == target => Ok(TransitionPlan::NoOp),
        ApplicationStatus::Approved => plan_admission(application, competing_set, request),
        ApplicationStatus::UnderReview | ApplicationStatus::Rejected => {
            ensure_open(application, request.target_status)?;
            Ok(TransitionPlan::Commit {
                changes: vec![direct_change(application, request)],
                guards: Vec::new(),
            })
        }
    }
}

fn plan_admission(
    application: &Application,
    competing_set: &[Application],
    request: &TransitionRequest<'_>,
) -> Result<TransitionPlan, DomainError> {
    let siblings: Vec<&Application> = competing_set
        .iter()
        .filter(|other| other.id != application.id && other.competes_with(application))
        .collect();

    // Checked before terminal status so a cascade-rejected application reports
    // the admission that displaced it.
    if let Some(admitted) = siblings
        .iter()
        .find(|sibling| sibling.status == ApplicationStatus::Approved)
    {
        return Err(DomainError::AlreadyAdmitted {
            student_id: application.student_id,
            institution_id: application.institution_id,
            admitted_application_id: admitted.id,
        });
    }
    ensure_open(application, ApplicationStatus::Approved)?;

    let mut changes = vec![direct_change(application, request)];
    let mut guards = Vec::new();
    for sibling in siblings {
        if sibling.status.is_open() {
            changes.push(PlannedChange {
                before: sibling.clone(),
                update: StatusUpdate {
                    status: ApplicationStatus::Rejected,
                    reviewed_at: request.now,
                    reviewed_by: request.actor_id,
                    review_notes: Some(AUTO_REJECT_NOTE.to_owned()),
                },
                auto_rejected: true,
            });
        } else {
            guards.push((sibling.id, sibling.version));
        }
    }

    Ok(TransitionPlan::Commit { changes, guards })
}

fn ensure_open(application: &Application, target: ApplicationStatus) -> Result<(), DomainError> {
    if application.status.is_terminal() {
        return Err(DomainError::Validation(format!(
            "application {} is {} and cannot move to {target}",
            application.id, application.status
        )));
    }
    Ok(())
}

fn direct_change(application: &Application, request: &TransitionRequest<'_>) -> PlannedChange {
    PlannedChange {
        before: application.clone(),
        update: StatusUpdate {
            status: request.target_status,
            reviewed_at: request.now,
            reviewed_by: request.actor_id,
            review_notes: request.notes.map(str::to_owned),
        },
        auto_rejected: false,
    }
}
