//! Location extraction through the general NER toolkit

use std::sync::Arc;

use tracing::info;

use crate::toolkit::NlpPipeline;
use crate::{inference_failure, preview, unique_in_text_order, LocationExtractor};
use geoloc_core::Result;

/// Entity labels treated as geographic locations (compared upper-cased)
pub const LOCATION_LABELS: &[&str] = &["LOCATION", "LOC", "GPE"];

/// Runs the toolkit's entity recogniser and keeps location-like entities
pub struct GeneralExtractor {
    pipeline: Arc<dyn NlpPipeline>,
}

impl GeneralExtractor {
    pub const MODEL_NAME: &'static str = "spaCy";

    pub fn new(pipeline: Arc<dyn NlpPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Whether a toolkit label denotes a location
pub fn is_location_label(label: &str) -> bool {
    let upper = label.to_uppercase();
    LOCATION_LABELS.contains(&upper.as_str())
}

impl LocationExtractor for GeneralExtractor {
    fn model_name(&self) -> &'static str {
        Self::MODEL_NAME
    }

    fn extract_locations(&self, text: &str) -> Result<Vec<String>> {
        let entities = self
            .pipeline
            .entities(text)
            .map_err(|e| inference_failure(Self::MODEL_NAME, "entity recognition", e))?;

        let found = entities
            .into_iter()
            .filter(|e| is_location_label(&e.label))
            .map(|e| e.text)
            .collect();
        let locations = unique_in_text_order(text, found);

        info!(
            pipeline = self.pipeline.name(),
            locations = ?locations,
            text = preview(text),
            "toolkit extraction finished"
        );
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{Token, Tokenizer};
    use crate::toolkit::{EntityPattern, RulePipeline};
    use crate::ExtractedEntity;
    use geoloc_core::GeolocError;

    fn extractor(patterns: Vec<EntityPattern>) -> GeneralExtractor {
        let pipeline = RulePipeline::new("test", Tokenizer::new(), patterns).unwrap();
        GeneralExtractor::new(Arc::new(pipeline))
    }

    #[test]
    fn test_berlin_and_rome() {
        let extractor = extractor(vec![
            EntityPattern::phrase("GPE", "Berlin"),
            EntityPattern::phrase("GPE", "Rome"),
            EntityPattern::phrase("DATE", "last summer"),
        ]);
        let locations = extractor
            .extract_locations("We visited Berlin and Rome last summer.")
            .unwrap();
        assert_eq!(locations, vec!["Berlin", "Rome"]);
    }

    #[test]
    fn test_label_filter_is_case_insensitive() {
        let extractor = extractor(vec![
            EntityPattern::phrase("loc", "the Alps"),
            EntityPattern::phrase("Location", "Sahara"),
            EntityPattern::phrase("PERSON", "Paris Hilton"),
        ]);
        let locations = extractor
            .extract_locations("Paris Hilton crossed the Sahara after the Alps.")
            .unwrap();
        assert_eq!(locations, vec!["Sahara", "the Alps"]);
    }

    #[test]
    fn test_duplicates_removed_and_ordered_by_text() {
        let extractor = extractor(vec![
            EntityPattern::phrase("GPE", "Oslo"),
            EntityPattern::phrase("GPE", "Bergen"),
        ]);
        let text = "Bergen, Oslo, Bergen and Oslo again.";
        let first = extractor.extract_locations(text).unwrap();
        assert_eq!(first, vec!["Bergen", "Oslo"]);
        assert_eq!(extractor.extract_locations(text).unwrap(), first);
    }

    #[test]
    fn test_punctuation_only_text_yields_nothing() {
        let extractor = extractor(vec![EntityPattern::phrase("GPE", "Oslo")]);
        assert!(extractor.extract_locations("  ...  ").unwrap().is_empty());
    }

    struct FailingPipeline;

    impl NlpPipeline for FailingPipeline {
        fn name(&self) -> &str {
            "failing"
        }

        fn tokenize(&self, _text: &str) -> Result<Vec<Token>> {
            Ok(Vec::new())
        }

        fn entities(&self, _text: &str) -> Result<Vec<ExtractedEntity>> {
            Err(GeolocError::Other(anyhow::anyhow!("parser crashed")))
        }
    }

    #[test]
    fn test_pipeline_errors_become_inference_failures() {
        let extractor = GeneralExtractor::new(Arc::new(FailingPipeline));
        let err = extractor.extract_locations("Lima").unwrap_err();
        assert!(matches!(err, GeolocError::InferenceFailure(_)));
    }
}
