//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use admissions_core::clock::Clock;
use admissions_decision::config::EngineConfig;
use admissions_store::pg_application_store::PgApplicationStore;
use admissions_test_support::{FixedClock, RecordingEventSink};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use admissions_api::routes;
use admissions_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Build the full app router with a real `PgApplicationStore`, a recording
/// sink and a fixed clock. Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_sink(pool, Arc::new(RecordingEventSink::new()))
}

/// Build the full app router publishing into `sink`.
pub fn build_test_app_with_sink(pool: PgPool, sink: Arc<RecordingEventSink>) -> Router {
    let store = Arc::new(PgApplicationStore::new(pool));
    let app_state = AppState::new(store, sink, fixed_clock(), EngineConfig::default());
    routes::app(app_state)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Submit an application and return its id.
pub async fn submit(pool: &PgPool, student_id: uuid::Uuid, institution_id: uuid::Uuid) -> uuid::Uuid {
    let (status, json) = post_json(
        build_test_app(pool.clone()),
        "/api/v1/applications",
        &serde_json::json!({
            "student_id": student_id,
            "institution_id": institution_id,
            "course_id": uuid::Uuid::new_v4(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["application_id"].as_str().unwrap().parse().unwrap()
}
