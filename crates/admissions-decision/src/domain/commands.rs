//! Commands for the Admission Decision context.

use std::time::Duration;

use admissions_core::application::ApplicationStatus;
use admissions_core::command::Command;
use uuid::Uuid;

/// Command to record a newly submitted application.
#[derive(Debug, Clone)]
pub struct SubmitApplication {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The applying student.
    pub student_id: Uuid,
    /// The institution applied to.
    pub institution_id: Uuid,
    /// The course applied for.
    pub course_id: Uuid,
}

impl Command for SubmitApplication {
    fn command_type(&self) -> &'static str {
        "admissions.submit_application"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to move one application to a new review status.
#[derive(Debug, Clone)]
pub struct TransitionApplication {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The application to transition.
    pub application_id: Uuid,
    /// The requested status.
    pub target_status: ApplicationStatus,
    /// The reviewing institution.
    pub actor_id: Uuid,
    /// Reviewer notes stored with the decision.
    pub notes: Option<String>,
    /// Overrides the engine's default deadline.
    pub timeout: Option<Duration>,
}

impl Command for TransitionApplication {
    fn command_type(&self) -> &'static str {
        "admissions.transition_application"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to move many applications to the same status.
#[derive(Debug, Clone)]
pub struct TransitionApplications {
    /// The correlation ID for tracing, shared by every item.
    pub correlation_id: Uuid,
    /// The applications to transition, processed in order.
    pub application_ids: Vec<Uuid>,
    /// The requested status.
    pub target_status: ApplicationStatus,
    /// The reviewing institution.
    pub actor_id: Uuid,
    /// Reviewer notes stored with every decision.
    pub notes: Option<String>,
}

impl Command for TransitionApplications {
    fn command_type(&self) -> &'static str {
        "admissions.transition_applications"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl TransitionApplications {
    /// The single-application command for one item of the batch.
    #[must_use]
    pub fn item(&self, application_id: Uuid) -> TransitionApplication {
        TransitionApplication {
            correlation_id: self.correlation_id,
            application_id,
            target_status: self.target_status,
            actor_id: self.actor_id,
            notes: self.notes.clone(),
            timeout: None,
        }
    }
}
