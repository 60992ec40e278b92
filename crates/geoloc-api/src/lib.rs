//! geoloc API - HTTP server for location extraction
//!
//! Serves the two extraction endpoints, health probes, the OpenAPI
//! document and a small browser frontend.

pub mod error;
pub mod handlers;
pub mod openapi;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use geoloc_core::config::{LoggingConfig, ServerConfig};
use handlers::{extract, frontend, health};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server);
    let body_limit = state.config.server.max_body_size;

    let router = Router::new()
        .route("/", get(frontend::index))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .route("/extract-with-spacy/", post(extract::extract_with_spacy))
        .route("/extract-with-bilstm/", post(extract::extract_with_bilstm))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// CORS policy from server config; `*` allows any origin
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(layer.allow_origin(origins))
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        format!("geoloc_api={level},geoloc_extractor={level},geoloc_core={level},tower_http={level}").into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Router with default config and no models loaded
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::default()))
}

/// Router with default config over a prepared registry
#[cfg(feature = "test-utils")]
pub fn create_router_with_registry(registry: geoloc_extractor::ModelRegistry) -> Router {
    let state = AppState::new(geoloc_core::AppConfig::default(), registry);
    create_router(Arc::new(state))
}
