//! The application record and its review status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Review status of an application.
///
/// The set is closed: values outside it are rejected when parsed at a
/// boundary (HTTP body, database row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Submitted and awaiting review.
    Pending,
    /// Picked up by a reviewer.
    UnderReview,
    /// Admitted. Terminal.
    Approved,
    /// Declined, either by a reviewer or by cascade. Terminal.
    Rejected,
}

impl ApplicationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::UnderReview,
        Self::Approved,
        Self::Rejected,
    ];

    /// Returns the canonical snake-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further engine-driven transition is permitted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Approved | Self::Rejected => true,
            Self::Pending | Self::UnderReview => false,
        }
    }

    /// Whether an application in this status is still competing for a
    /// place and must be rejected when a sibling is approved.
    #[must_use]
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "under_review" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::Validation(format!(
                "unknown application status: {other:?}"
            ))),
        }
    }
}

/// One student's request against one (institution, course) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Unique identifier, immutable.
    pub id: Uuid,
    /// Applying student.
    pub student_id: Uuid,
    /// Institution that owns the course and reviews the application.
    pub institution_id: Uuid,
    /// Course applied for.
    pub course_id: Uuid,
    /// Current review status.
    pub status: ApplicationStatus,
    /// Creation timestamp, immutable.
    pub created_at: DateTime<Utc>,
    /// When the application left `pending`/`under_review`.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Actor that made the last review decision.
    pub reviewed_by: Option<Uuid>,
    /// Free-text notes attached to the last review decision.
    pub review_notes: Option<String>,
    /// Logical clock, incremented on every status write.
    pub version: i64,
}

impl Application {
    /// Creates a freshly submitted application in `pending` at version 0.
    #[must_use]
    pub fn submitted(
        id: Uuid,
        student_id: Uuid,
        institution_id: Uuid,
        course_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            institution_id,
            course_id,
            status: ApplicationStatus::Pending,
            created_at,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            version: 0,
        }
    }

    /// Whether `other` belongs to the same competing set.
    #[must_use]
    pub fn competes_with(&self, other: &Self) -> bool {
        self.student_id == other.student_id && self.institution_id == other.institution_id
    }

    /// Returns a copy with `update` applied and the version bumped, which is
    /// what a store holds after committing the update.
    #[must_use]
    pub fn with_update(&self, update: &StatusUpdate) -> Self {
        Self {
            status: update.status,
            reviewed_at: Some(update.reviewed_at),
            reviewed_by: Some(update.reviewed_by),
            review_notes: update.review_notes.clone(),
            version: self.version + 1,
            ..self.clone()
        }
    }
}

/// The mutable review fields written by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// New status.
    pub status: ApplicationStatus,
    /// Decision timestamp.
    pub reviewed_at: DateTime<Utc>,
    /// Deciding actor.
    pub reviewed_by: Uuid,
    /// Decision notes.
    pub review_notes: Option<String>,
}
