//! OpenAPI document, served as JSON at `/api-docs/openapi.json`

use axum::Json;
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::handlers::{
    extract::{self, LocationOut, TextIn},
    frontend,
    health::{self, HealthResponse, MetricsResponse, ReadinessChecks, ReadinessResponse},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Location Extractor API",
        description = "Extract geographic locations from text with a general NER pipeline or a BiLSTM-CRF tagger."
    ),
    paths(
        extract::extract_with_spacy,
        extract::extract_with_bilstm,
        frontend::index,
        health::health_check,
        health::readiness_check,
        health::metrics,
    ),
    components(schemas(
        TextIn,
        LocationOut,
        ApiError,
        HealthResponse,
        ReadinessResponse,
        ReadinessChecks,
        MetricsResponse,
    )),
    tags(
        (name = "extraction", description = "Location extraction"),
        (name = "health", description = "Liveness, readiness and metrics"),
        (name = "frontend", description = "Browser interface")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_extraction_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/extract-with-spacy/"));
        assert!(doc.paths.paths.contains_key("/extract-with-bilstm/"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
