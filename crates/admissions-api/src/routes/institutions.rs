//! Routes for institution-level read views.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use tracing::instrument;
use uuid::Uuid;

use admissions_decision::application::query_handlers::{self, InstitutionAdmissionSummary};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /{id}/summary
#[instrument(skip(state))]
async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstitutionAdmissionSummary>, ApiError> {
    let summary = query_handlers::institution_summary(id, state.store.as_ref()).await?;
    Ok(Json(summary))
}

/// Returns the router for institutions.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/summary", get(get_summary))
}
