//! Query handlers for applications.
//!
//! Read-only views over the store. Nothing here takes part in decisions.

use admissions_core::application::{Application, ApplicationStatus};
use admissions_core::error::DomainError;
use admissions_core::store::ApplicationStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    /// The application identifier.
    pub application_id: Uuid,
    /// The applicant.
    pub student_id: Uuid,
    /// The institution applied to.
    pub institution_id: Uuid,
    /// The program applied for.
    pub course_id: Uuid,
    /// Current review status.
    pub status: ApplicationStatus,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Time of the last review transition.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Actor of the last review transition.
    pub reviewed_by: Option<Uuid>,
    /// Notes of the last review transition.
    pub review_notes: Option<String>,
    /// Number of committed writes.
    pub version: i64,
}

impl From<Application> for ApplicationView {
    fn from(application: Application) -> Self {
        Self {
            application_id: application.id,
            student_id: application.student_id,
            institution_id: application.institution_id,
            course_id: application.course_id,
            status: application.status,
            created_at: application.created_at,
            reviewed_at: application.reviewed_at,
            reviewed_by: application.reviewed_by,
            review_notes: application.review_notes,
            version: application.version,
        }
    }
}

/// Per-status application counts for one institution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstitutionAdmissionSummary {
    /// The institution summarised.
    pub institution_id: Uuid,
    /// Applications awaiting review.
    pub pending: usize,
    /// Applications under review.
    pub under_review: usize,
    /// Admitted applications.
    pub approved: usize,
    /// Rejected applications, cascades included.
    pub rejected: usize,
    /// All applications.
    pub total: usize,
}

/// Retrieves an application by id.
///
/// # Errors
///
/// Returns `DomainError::ApplicationNotFound` if no application has the id.
pub async fn get_application(
    application_id: Uuid,
    store: &dyn ApplicationStore,
) -> Result<ApplicationView, DomainError> {
    store
        .get(application_id)
        .await?
        .map(ApplicationView::from)
        .ok_or(DomainError::ApplicationNotFound(application_id))
}

/// Counts an institution's applications by status.
///
/// An institution with no applications yields an all-zero summary.
///
/// # Errors
///
/// Returns `DomainError` if the store query fails.
pub async fn institution_summary(
    institution_id: Uuid,
    store: &dyn ApplicationStore,
) -> Result<InstitutionAdmissionSummary, DomainError> {
    let applications = store.query_by_institution(institution_id).await?;

    let mut summary = InstitutionAdmissionSummary {
        institution_id,
        total: applications.len(),
        ..InstitutionAdmissionSummary::default()
    };
    for application in &applications {
        match application.status {
            ApplicationStatus::Pending => summary.pending += 1,
            ApplicationStatus::UnderReview => summary.under_review += 1,
            ApplicationStatus::Approved => summary.approved += 1,
            ApplicationStatus::Rejected => summary.rejected += 1,
        }
    }
    Ok(summary)
}
