//! Location extraction through the BiLSTM-CRF tagger

use std::sync::Arc;

use tracing::{debug, info};

use crate::preprocess::Preprocessor;
use crate::registry::TaggerBundle;
use crate::spans::reconstruct_spans;
use crate::toolkit::NlpPipeline;
use crate::vocab::Tag;
use crate::{inference_failure, preview, unique_in_text_order, LocationExtractor};
use geoloc_core::{GeolocError, Result};

/// Tokenizes with the toolkit pipeline, tags with the BiLSTM-CRF and
/// rebuilds B-LOC/I-LOC spans
pub struct BiLstmExtractor {
    pipeline: Arc<dyn NlpPipeline>,
    bundle: Arc<TaggerBundle>,
    preprocessor: Preprocessor,
}

impl BiLstmExtractor {
    pub const MODEL_NAME: &'static str = "BiLSTM-CRF";

    pub fn new(pipeline: Arc<dyn NlpPipeline>, bundle: Arc<TaggerBundle>) -> Self {
        let preprocessor = Preprocessor::new(bundle.max_seq_len);
        Self {
            pipeline,
            bundle,
            preprocessor,
        }
    }

    /// Predicted tag per retained token, without span reconstruction
    pub fn tag_tokens(&self, text: &str) -> Result<Vec<(String, Tag)>> {
        let encoded = match self
            .preprocessor
            .run(self.pipeline.as_ref(), &self.bundle.vocab, text)
            .map_err(|e| inference_failure(Self::MODEL_NAME, "tokenization", e))?
        {
            Some(encoded) => encoded,
            None => return Ok(Vec::new()),
        };

        let truncated = encoded.truncated;
        let predicted = self
            .bundle
            .decoder
            .decode(&encoded.ids, &encoded.mask)
            .map_err(|e| inference_failure(Self::MODEL_NAME, "decoding", e))?;
        if predicted.is_empty() {
            return Err(inference_failure(
                Self::MODEL_NAME,
                "decoding",
                GeolocError::InferenceFailure("decoder returned no tags".into()),
            ));
        }

        let tagged: Vec<(String, Tag)> = encoded
            .tokens
            .into_iter()
            .zip(predicted)
            .map(|(token, id)| {
                let tag = self.bundle.tags.lookup_tag(id);
                (token, tag)
            })
            .collect();
        debug!(tagged = tagged.len(), truncated, "tagged tokens");
        Ok(tagged)
    }
}

impl LocationExtractor for BiLstmExtractor {
    fn model_name(&self) -> &'static str {
        Self::MODEL_NAME
    }

    fn extract_locations(&self, text: &str) -> Result<Vec<String>> {
        let tagged = self.tag_tokens(text)?;
        let (tokens, tags): (Vec<String>, Vec<Tag>) = tagged.into_iter().unzip();

        let spans = reconstruct_spans(&tokens, &tags);
        let locations = unique_in_text_order(text, spans);

        info!(
            tokens = tokens.len(),
            locations = ?locations,
            text = preview(text),
            "BiLSTM-CRF extraction finished"
        );
        Ok(locations)
    }
}
