//! Location extraction handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use geoloc_extractor::ModelKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Extraction request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TextIn {
    /// Text to search for locations
    #[validate(length(min = 1, message = "text must not be empty"))]
    #[schema(
        example = "I will travel from London to Tokyo, passing through Paris and then to New York.",
        min_length = 1
    )]
    pub text: String,
}

/// Extraction response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationOut {
    /// The original input text
    #[schema(example = "We visited Berlin and Rome last summer.")]
    pub input_text: String,

    /// Unique locations in order of first appearance
    #[schema(example = json!(["Berlin", "Rome"]))]
    pub extracted_locations: Vec<String>,

    /// Name of the model used for extraction
    #[schema(example = "spaCy")]
    pub model_used: String,

    /// Error message if any
    pub error_message: Option<String>,
}

/// Extract locations with the general NER toolkit
#[utoipa::path(
    post,
    path = "/extract-with-spacy/",
    tag = "extraction",
    request_body = TextIn,
    responses(
        (status = 200, description = "Locations extracted", body = LocationOut),
        (status = 422, description = "Malformed body, empty or missing text", body = crate::error::ApiError),
        (status = 500, description = "Extraction failed", body = crate::error::ApiError),
        (status = 503, description = "Toolkit model not loaded", body = crate::error::ApiError)
    )
)]
pub async fn extract_with_spacy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TextIn>, JsonRejection>,
) -> Result<Json<LocationOut>, AppError> {
    run_extraction(&state, ModelKind::Toolkit, payload).await
}

/// Extract locations with the BiLSTM-CRF tagger
#[utoipa::path(
    post,
    path = "/extract-with-bilstm/",
    tag = "extraction",
    request_body = TextIn,
    responses(
        (status = 200, description = "Locations extracted", body = LocationOut),
        (status = 422, description = "Malformed body, empty or missing text", body = crate::error::ApiError),
        (status = 500, description = "Extraction failed", body = crate::error::ApiError),
        (status = 503, description = "Tagger, mappings or tokenizer not loaded", body = crate::error::ApiError)
    )
)]
pub async fn extract_with_bilstm(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TextIn>, JsonRejection>,
) -> Result<Json<LocationOut>, AppError> {
    run_extraction(&state, ModelKind::Bilstm, payload).await
}

async fn run_extraction(
    state: &AppState,
    kind: ModelKind,
    payload: Result<Json<TextIn>, JsonRejection>,
) -> Result<Json<LocationOut>, AppError> {
    state.increment_requests();
    let Json(req) = payload?;
    req.validate()?;

    let extractor = state.registry.extractor(kind).map_err(|e| {
        warn!(model = %kind, error = %e, "extraction requested from a model that is not loaded");
        e
    })?;
    let model_used = extractor.model_name();
    info!(
        model = model_used,
        text = %req.text.chars().take(70).collect::<String>(),
        "extraction request"
    );

    let text = req.text.clone();
    let locations = tokio::task::spawn_blocking(move || extractor.extract_locations(&text))
        .await
        .map_err(|e| AppError::Inference(format!("extraction task failed: {e}")))??;

    Ok(Json(LocationOut {
        input_text: req.text,
        extracted_locations: locations,
        model_used: model_used.to_string(),
        error_message: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_fails_validation() {
        let req = TextIn { text: String::new() };
        assert!(req.validate().is_err());

        let req = TextIn { text: "Lagos".into() };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_location_out_serializes_null_error() {
        let out = LocationOut {
            input_text: "Oslo".into(),
            extracted_locations: vec!["Oslo".into()],
            model_used: "spaCy".into(),
            error_message: None,
        };
        let json = serde_json::to_value(out).unwrap();
        assert!(json["error_message"].is_null());
        assert_eq!(json["extracted_locations"][0], "Oslo");
    }
}
