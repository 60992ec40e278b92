//! geoloc API Server
//!
//! Loads the configured models once, then serves extraction requests.

use geoloc_api::{create_router, init_tracing, state::AppState};
use geoloc_core::config::AppConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (GEOLOC_CONFIG file, then environment)
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        data_dir = %config.models.data_dir.display(),
        max_seq_len = config.models.max_seq_len,
        "loading models"
    );

    // Model loading reads and parses weight files
    let state = tokio::task::spawn_blocking(move || AppState::load(config)).await?;
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("geoloc API server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
