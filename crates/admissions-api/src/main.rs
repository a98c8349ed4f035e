//! Admissions API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use admissions_api::config::ServerConfig;
use admissions_api::error::AppError;
use admissions_api::routes;
use admissions_api::sink::TracingEventSink;
use admissions_api::state::AppState;
use admissions_core::clock::SystemClock;
use admissions_store::pg_application_store::PgApplicationStore;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting admissions API server");

    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    let store = PgApplicationStore::new(pool);
    store.provision().await.map_err(AppError::Provision)?;

    let app_state = AppState::new(
        Arc::new(store),
        Arc::new(TracingEventSink),
        Arc::new(SystemClock),
        config.engine.clone(),
    );

    // TODO: Replace CorsLayer::permissive() with the UI's origin once it is deployed.
    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
