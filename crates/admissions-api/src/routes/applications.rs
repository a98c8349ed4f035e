//! Routes for applications: submission, read view and review transitions.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use admissions_core::application::ApplicationStatus;
use admissions_core::command::Command;
use admissions_decision::application::bulk::BulkResult;
use admissions_decision::application::engine::TransitionResult;
use admissions_decision::application::command_handlers;
use admissions_decision::application::query_handlers::{self, ApplicationView};
use admissions_decision::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct SubmitApplicationRequest {
    /// The applicant.
    pub student_id: Uuid,
    /// The institution applied to.
    pub institution_id: Uuid,
    /// The program applied for.
    pub course_id: Uuid,
}

/// Request body for POST /{id}/transition.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// `under_review`, `approved` or `rejected`.
    pub target_status: String,
    /// The reviewing institution.
    pub actor_id: Uuid,
    /// Free-text review notes.
    pub notes: Option<String>,
    /// Overrides the engine's default deadline.
    pub timeout_ms: Option<u64>,
}

/// Request body for POST /transition-many.
#[derive(Debug, Deserialize)]
pub struct BulkTransitionRequest {
    /// Applications to transition, processed in order.
    pub application_ids: Vec<Uuid>,
    /// `under_review`, `approved` or `rejected`.
    pub target_status: String,
    /// The reviewing institution.
    pub actor_id: Uuid,
    /// Free-text review notes, applied to every item.
    pub notes: Option<String>,
}

/// POST /
#[instrument(skip(state, request), fields(student_id = %request.student_id, institution_id = %request.institution_id))]
async fn submit_application(
    State(state): State<AppState>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationView>), ApiError> {
    let command = commands::SubmitApplication {
        correlation_id: Uuid::new_v4(),
        student_id: request.student_id,
        institution_id: request.institution_id,
        course_id: request.course_id,
    };

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        "handling command"
    );

    let application = command_handlers::handle_submit_application(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ApplicationView::from(application))))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationView>, ApiError> {
    let view = query_handlers::get_application(id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// POST /{id}/transition
#[instrument(skip(state, request), fields(target_status = %request.target_status))]
async fn transition_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionResult>, ApiError> {
    let command = commands::TransitionApplication {
        correlation_id: Uuid::new_v4(),
        application_id: id,
        target_status: request.target_status.parse::<ApplicationStatus>()?,
        actor_id: request.actor_id,
        notes: request.notes,
        timeout: request.timeout_ms.map(Duration::from_millis),
    };

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        "handling command"
    );

    let result = state.engine.transition(&command).await?;
    Ok(Json(result))
}

/// POST /transition-many
#[instrument(skip(state, request), fields(target_status = %request.target_status, item_count = request.application_ids.len()))]
async fn transition_many(
    State(state): State<AppState>,
    Json(request): Json<BulkTransitionRequest>,
) -> Result<Json<BulkResult>, ApiError> {
    let command = commands::TransitionApplications {
        correlation_id: Uuid::new_v4(),
        application_ids: request.application_ids,
        target_status: request.target_status.parse::<ApplicationStatus>()?,
        actor_id: request.actor_id,
        notes: request.notes,
    };

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        "handling command"
    );

    let result = state.bulk.transition_many(&command).await?;
    Ok(Json(result))
}

/// Returns the router for applications.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_application))
        .route("/transition-many", post(transition_many))
        .route("/{id}", get(get_application))
        .route("/{id}/transition", post(transition_application))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use admissions_core::application::Application;
    use admissions_core::store::ApplicationStore;
    use admissions_decision::config::EngineConfig;
    use admissions_test_support::{
        FailingApplicationStore, FixedClock, InMemoryApplicationStore, RecordingEventSink,
    };
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state_with(store: Arc<dyn ApplicationStore>) -> AppState {
        AppState::new(
            store,
            Arc::new(RecordingEventSink::new()),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap())),
            EngineConfig::default(),
        )
    }

    fn submitted(student_id: Uuid, institution_id: Uuid) -> Application {
        Application::submitted(
            Uuid::new_v4(),
            student_id,
            institution_id,
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        )
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_submit_application_returns_201_with_pending_view() {
        // Arrange
        let store = Arc::new(InMemoryApplicationStore::new());
        let app = router().with_state(app_state_with(store.clone()));
        let student_id = Uuid::new_v4();
        let body = serde_json::json!({
            "student_id": student_id,
            "institution_id": Uuid::new_v4(),
            "course_id": Uuid::new_v4(),
        });

        // Act
        let (status, json) = send(app, "POST", "/", Some(body)).await;

        // Assert
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["student_id"], student_id.to_string());
        assert_eq!(json["version"], 0);
        let id: Uuid = json["application_id"].as_str().unwrap().parse().unwrap();
        assert!(store.snapshot(id).is_some());
    }

    #[tokio::test]
    async fn test_submit_application_returns_422_for_missing_fields() {
        let app = router().with_state(app_state_with(Arc::new(InMemoryApplicationStore::new())));

        let (status, _) = send(app, "POST", "/", Some(serde_json::json!({}))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_get_application_returns_404_for_unknown_id() {
        // Arrange
        let app = router().with_state(app_state_with(Arc::new(InMemoryApplicationStore::new())));

        // Act
        let (status, json) = send(app, "GET", &format!("/{}", Uuid::new_v4()), None).await;

        // Assert
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "application_not_found");
    }

    #[tokio::test]
    async fn test_get_application_returns_503_when_store_is_down() {
        let app = router().with_state(app_state_with(Arc::new(FailingApplicationStore)));

        let (status, json) = send(app, "GET", &format!("/{}", Uuid::new_v4()), None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "store_unavailable");
    }

    #[tokio::test]
    async fn test_approve_returns_auto_rejected_count() {
        // Arrange
        let student = Uuid::new_v4();
        let institution = Uuid::new_v4();
        let target = submitted(student, institution);
        let sibling = submitted(student, institution);
        let store = Arc::new(InMemoryApplicationStore::with_applications([
            target.clone(),
            sibling.clone(),
        ]));
        let app = router().with_state(app_state_with(store.clone()));
        let body = serde_json::json!({
            "target_status": "approved",
            "actor_id": institution,
            "notes": "strong portfolio",
        });

        // Act
        let (status, json) =
            send(app, "POST", &format!("/{}/transition", target.id), Some(body)).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["applied"], true);
        assert_eq!(json["auto_rejected_count"], 1);
        assert_eq!(
            store.snapshot(sibling.id).unwrap().status,
            ApplicationStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_transition_returns_409_when_student_already_admitted() {
        // Arrange
        let student = Uuid::new_v4();
        let institution = Uuid::new_v4();
        let admitted = Application {
            status: ApplicationStatus::Approved,
            version: 1,
            ..submitted(student, institution)
        };
        let target = submitted(student, institution);
        let app = router().with_state(app_state_with(Arc::new(
            InMemoryApplicationStore::with_applications([admitted, target.clone()]),
        )));
        let body = serde_json::json!({ "target_status": "approved", "actor_id": institution });

        // Act
        let (status, json) =
            send(app, "POST", &format!("/{}/transition", target.id), Some(body)).await;

        // Assert
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "already_admitted");
    }

    #[tokio::test]
    async fn test_transition_returns_400_for_unknown_status() {
        let app = router().with_state(app_state_with(Arc::new(InMemoryApplicationStore::new())));
        let body = serde_json::json!({ "target_status": "waitlisted", "actor_id": Uuid::new_v4() });

        let (status, json) =
            send(app, "POST", &format!("/{}/transition", Uuid::new_v4()), Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_transition_returns_403_for_foreign_institution() {
        let target = submitted(Uuid::new_v4(), Uuid::new_v4());
        let app = router().with_state(app_state_with(Arc::new(
            InMemoryApplicationStore::with_applications([target.clone()]),
        )));
        let body = serde_json::json!({ "target_status": "rejected", "actor_id": Uuid::new_v4() });

        let (status, json) =
            send(app, "POST", &format!("/{}/transition", target.id), Some(body)).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_transition_many_reports_per_item_outcomes() {
        // Arrange
        let institution = Uuid::new_v4();
        let first = submitted(Uuid::new_v4(), institution);
        let second = submitted(Uuid::new_v4(), institution);
        let missing = Uuid::new_v4();
        let app = router().with_state(app_state_with(Arc::new(
            InMemoryApplicationStore::with_applications([first.clone(), second.clone()]),
        )));
        let body = serde_json::json!({
            "application_ids": [first.id, missing, second.id],
            "target_status": "under_review",
            "actor_id": institution,
        });

        // Act
        let (status, json) = send(app, "POST", "/transition-many", Some(body)).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        let succeeded = json["succeeded"].as_array().unwrap();
        assert_eq!(succeeded.len(), 2);
        let failed = json["failed"].as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["application_id"], missing.to_string());
        assert_eq!(failed[0]["reason"], "not-found");
    }

    #[tokio::test]
    async fn test_transition_many_returns_400_for_pending_target() {
        let app = router().with_state(app_state_with(Arc::new(InMemoryApplicationStore::new())));
        let body = serde_json::json!({
            "application_ids": [Uuid::new_v4()],
            "target_status": "pending",
            "actor_id": Uuid::new_v4(),
        });

        let (status, json) = send(app, "POST", "/transition-many", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }
}
