//! Application store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::{Application, StatusUpdate};
use crate::error::DomainError;

/// One element of a conditional multi-write.
///
/// The write only commits if the stored version of `application_id` still
/// equals `expected_version`. With `update: None` the element is a pure
/// precondition: the record is checked but not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalWrite {
    /// The application to check (and possibly write).
    pub application_id: Uuid,
    /// The version read before planning the write.
    pub expected_version: i64,
    /// The review fields to write; the store increments the version.
    pub update: Option<StatusUpdate>,
}

impl ConditionalWrite {
    /// A precondition-checked status write.
    #[must_use]
    pub fn update(application_id: Uuid, expected_version: i64, update: StatusUpdate) -> Self {
        Self {
            application_id,
            expected_version,
            update: Some(update),
        }
    }

    /// A precondition with no write.
    #[must_use]
    pub fn guard(application_id: Uuid, expected_version: i64) -> Self {
        Self {
            application_id,
            expected_version,
            update: None,
        }
    }
}

/// Durable keyed storage for application records.
///
/// This is the only shared mutable resource of the engine and the sole
/// arbiter of the one-admission-per-institution invariant: every decision is
/// committed through [`ApplicationStore::conditional_multi_write`].
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Point read.
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError>;

    /// Every application of the competing set `(student_id, institution_id)`.
    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError>;

    /// Every application submitted to `institution_id`.
    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError>;

    /// Inserts a new application.
    ///
    /// Returns `DomainError::ConcurrencyConflict` if the id is taken.
    async fn insert(&self, application: &Application) -> Result<(), DomainError>;

    /// Atomically applies every write, or none.
    ///
    /// Returns `DomainError::ConcurrencyConflict` if any element's
    /// `expected_version` no longer matches, and
    /// `DomainError::ApplicationNotFound` if any element's record is missing.
    /// In both cases the store is left unchanged.
    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError>;
}
