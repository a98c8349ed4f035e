//! Route modules and the assembled API router.

use axum::Router;

use crate::state::AppState;

pub mod applications;
pub mod health;
pub mod institutions;

/// Builds the full router: health check plus the versioned API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/applications", applications::router())
        .nest("/api/v1/institutions", institutions::router())
        .with_state(state)
}
