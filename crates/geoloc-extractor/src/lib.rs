//! geoloc extractor - location extraction pipelines
//!
//! Implements two ways of pulling geographic location mentions out of
//! free text:
//! - General NER: a rule-driven toolkit pipeline whose entities are
//!   filtered down to location-like labels
//! - BiLSTM-CRF: a recurrent sequence tagger with a CRF output layer,
//!   decoded into B-LOC/I-LOC spans
//!
//! Both paths return de-duplicated locations ordered by where they first
//! occur in the input.

use std::collections::HashSet;

use geoloc_core::{GeolocError, Result};
use serde::Serialize;

/// Entity recognised in a text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedEntity {
    /// Verbatim source slice
    pub text: String,
    /// Category label as produced by the recogniser (e.g. "GPE")
    pub label: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

/// Trait for location extractors
pub trait LocationExtractor: Send + Sync {
    /// Name reported to API callers as `model_used`
    fn model_name(&self) -> &'static str;

    /// Extract unique location strings ordered by first occurrence in `text`
    fn extract_locations(&self, text: &str) -> Result<Vec<String>>;
}

/// Which extractor a caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// General NER toolkit pipeline
    Toolkit,
    /// BiLSTM-CRF sequence tagger
    Bilstm,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toolkit => write!(f, "toolkit"),
            Self::Bilstm => write!(f, "bilstm"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = GeolocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "toolkit" | "spacy" | "general" => Ok(Self::Toolkit),
            "bilstm" | "bilstm-crf" => Ok(Self::Bilstm),
            _ => Err(GeolocError::Config(format!("unknown model kind: {s}"))),
        }
    }
}

/// Drop repeated spans and order the rest by first occurrence in `text`.
///
/// Spans that cannot be found verbatim sort before every found span; ties
/// keep the order in which the spans were produced.
pub fn unique_in_text_order(text: &str, spans: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique: Vec<String> = spans
        .into_iter()
        .filter(|span| seen.insert(span.clone()))
        .collect();

    unique.sort_by_key(|span| text.find(span.as_str()));
    unique
}

/// Re-classify a failure raised while running a loaded model
pub(crate) fn inference_failure(model: &str, stage: &str, err: GeolocError) -> GeolocError {
    tracing::error!(model, stage, error = %err, "extraction failed");
    match err {
        GeolocError::InferenceFailure(_) => err,
        other => GeolocError::InferenceFailure(format!("{stage}: {other}")),
    }
}

/// First characters of `text`, for log lines
pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(70) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub mod bilstm;
pub mod general;
pub mod preprocess;
pub mod registry;
pub mod spans;
pub mod tagger;
pub mod tokenizer;
pub mod toolkit;
pub mod vocab;

pub use bilstm::BiLstmExtractor;
pub use general::GeneralExtractor;
pub use registry::{ModelRegistry, ModelStatus, TaggerBundle};
pub use tagger::{BiLstmCrf, SequenceDecoder, TaggerConfig, TaggerError};
pub use tokenizer::{Token, Tokenizer};
pub use toolkit::{NlpPipeline, RulePipeline};
pub use vocab::{ReservedTokens, Tag, TagSet, Vocabulary};
