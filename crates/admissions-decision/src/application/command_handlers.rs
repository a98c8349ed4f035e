//! Command handlers for application intake.
//!
//! Review transitions go through the
//! [`AdmissionDecisionEngine`](crate::application::engine::AdmissionDecisionEngine);
//! this module only creates new applications.

use admissions_core::application::Application;
use admissions_core::clock::Clock;
use admissions_core::error::DomainError;
use admissions_core::store::ApplicationStore;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::commands::SubmitApplication;

/// Handles the `SubmitApplication` command: creates a pending application at
/// version 0 and persists it.
///
/// # Errors
///
/// Returns `DomainError` if the insert fails.
#[instrument(
    skip(command, clock, store),
    fields(
        student_id = %command.student_id,
        institution_id = %command.institution_id,
        correlation_id = %command.correlation_id,
    )
)]
pub async fn handle_submit_application(
    command: &SubmitApplication,
    clock: &dyn Clock,
    store: &dyn ApplicationStore,
) -> Result<Application, DomainError> {
    let application = Application::submitted(
        Uuid::new_v4(),
        command.student_id,
        command.institution_id,
        command.course_id,
        clock.now(),
    );

    store.insert(&application).await?;

    info!(application_id = %application.id, "application submitted");
    Ok(application)
}
