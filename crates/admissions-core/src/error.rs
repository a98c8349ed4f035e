//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// No application exists with the given id.
    #[error("application not found: {0}")]
    ApplicationNotFound(Uuid),

    /// The student already holds an admission at this institution.
    #[error(
        "already-admitted: student {student_id} already admitted to institution {institution_id} via application {admitted_application_id}"
    )]
    AlreadyAdmitted {
        /// The student of the competing set.
        student_id: Uuid,
        /// The institution of the competing set.
        institution_id: Uuid,
        /// The application that holds the admission.
        admitted_application_id: Uuid,
    },

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on application {application_id}: expected version {expected}, found {}",
        version_label(.actual)
    )]
    ConcurrencyConflict {
        /// The application whose precondition failed.
        application_id: Uuid,
        /// The version the writer read.
        expected: i64,
        /// The version found at commit time, when the store can report it.
        actual: Option<i64>,
    },

    /// Bad input or an illegal transition.
    #[error("validation error: {0}")]
    Validation(String),

    /// The actor does not own the institution the application belongs to.
    #[error("actor {actor_id} may not review applications of institution {institution_id}")]
    Unauthorized {
        /// The acting identity.
        actor_id: Uuid,
        /// The institution that owns the application.
        institution_id: Uuid,
    },

    /// A transient store failure (connection loss, pool exhaustion).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The transition did not complete within its deadline.
    #[error("transition timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// A non-transient infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

fn version_label(actual: &Option<i64>) -> String {
    actual.map_or_else(|| "unknown".to_owned(), |v| v.to_string())
}

impl DomainError {
    /// Stable, machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ApplicationNotFound(_) => "not-found",
            Self::AlreadyAdmitted { .. } => "already-admitted",
            Self::ConcurrencyConflict { .. } => "version-mismatch",
            Self::Validation(_) => "validation",
            Self::Unauthorized { .. } => "unauthorized",
            Self::StoreUnavailable(_) => "store-unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Infrastructure(_) => "infrastructure",
        }
    }

    /// Whether this is a conflict of either subtype.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyAdmitted { .. } | Self::ConcurrencyConflict { .. }
        )
    }

    /// Version mismatches are resolved by re-reading and trying again.
    /// Invariant violations are not.
    #[must_use]
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Whether the same store call may succeed if re-issued.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
