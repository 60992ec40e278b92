//! Process-lifetime holder of the loaded models
//!
//! Built once at startup and shared read-only afterwards. Each path loads
//! independently: a broken tagger never disables the toolkit, and the
//! reverse only matters to the tagger because it borrows the toolkit's
//! tokenizer.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::bilstm::BiLstmExtractor;
use crate::general::GeneralExtractor;
use crate::tagger::{BiLstmCrf, SequenceDecoder, TaggerConfig};
use crate::toolkit::{NlpPipeline, RulePipeline};
use crate::vocab::{ReservedTokens, TagSet, Vocabulary};
use crate::{LocationExtractor, ModelKind};
use geoloc_core::{GeolocError, ModelConfig, Result};

/// Everything the BiLSTM-CRF path needs besides the tokenizer
pub struct TaggerBundle {
    pub vocab: Vocabulary,
    pub tags: TagSet,
    pub decoder: Arc<dyn SequenceDecoder>,
    pub max_seq_len: usize,
}

impl TaggerBundle {
    /// Load mappings and weights from the configured BiLSTM directory
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let required = [config.word2idx_path(), config.tag2idx_path(), config.weights_path()];
        let missing: Vec<PathBuf> = required.iter().filter(|p| !p.exists()).cloned().collect();
        if !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(GeolocError::ModelUnavailable(format!(
                "missing BiLSTM-CRF artifacts: {}",
                listed.join(", ")
            )));
        }

        let vocab = Vocabulary::load(&config.word2idx_path(), &ReservedTokens::from(config))?;
        let tags = TagSet::load(&config.tag2idx_path())?;
        let tagger_config = TaggerConfig::from_model_config(config, vocab.len(), tags.len());
        let model = BiLstmCrf::load(&config.weights_path(), tagger_config)?;

        Ok(Self {
            vocab,
            tags,
            decoder: Arc::new(model),
            max_seq_len: config.max_seq_len,
        })
    }
}

/// Load state of both extraction paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub toolkit_loaded: bool,
    pub tagger_loaded: bool,
    pub vocab_size: Option<usize>,
    pub num_tags: Option<usize>,
}

impl ModelStatus {
    pub fn general_available(&self) -> bool {
        self.toolkit_loaded
    }

    /// The tagger path also needs the toolkit tokenizer
    pub fn bilstm_available(&self) -> bool {
        self.toolkit_loaded && self.tagger_loaded
    }

    pub fn any_available(&self) -> bool {
        self.general_available() || self.bilstm_available()
    }
}

/// Loaded models, or `None` for a path that failed to load
#[derive(Clone, Default)]
pub struct ModelRegistry {
    pipeline: Option<Arc<dyn NlpPipeline>>,
    tagger: Option<Arc<TaggerBundle>>,
}

impl ModelRegistry {
    pub fn new(pipeline: Option<Arc<dyn NlpPipeline>>, tagger: Option<Arc<TaggerBundle>>) -> Self {
        Self { pipeline, tagger }
    }

    /// Registry with nothing loaded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load both paths from disk. Never fails; failures leave that path empty.
    pub fn load(config: &ModelConfig) -> Self {
        let toolkit_dir = config.toolkit_model_path();
        let pipeline = match RulePipeline::load(&toolkit_dir) {
            Ok(pipeline) => Some(Arc::new(pipeline) as Arc<dyn NlpPipeline>),
            Err(e) => {
                warn!(path = %toolkit_dir.display(), error = %e, "toolkit pipeline not loaded");
                None
            }
        };

        let tagger = match TaggerBundle::load(config) {
            Ok(bundle) => {
                info!(
                    vocab = bundle.vocab.len(),
                    tags = bundle.tags.len(),
                    max_seq_len = bundle.max_seq_len,
                    "BiLSTM-CRF tagger loaded"
                );
                Some(Arc::new(bundle))
            }
            Err(e) => {
                warn!(path = %config.bilstm_path().display(), error = %e, "BiLSTM-CRF tagger not loaded");
                None
            }
        };

        let registry = Self::new(pipeline, tagger);
        registry.log_summary();
        registry
    }

    fn log_summary(&self) {
        let status = self.status();
        match (status.toolkit_loaded, status.tagger_loaded) {
            (true, true) => info!("all models ready"),
            (false, false) => error!("no models loaded; every extraction request will be refused"),
            (true, false) => warn!("BiLSTM-CRF extraction unavailable"),
            (false, true) => warn!("toolkit unavailable; BiLSTM-CRF extraction has no tokenizer"),
        }
    }

    pub fn pipeline(&self) -> Option<&Arc<dyn NlpPipeline>> {
        self.pipeline.as_ref()
    }

    pub fn general_extractor(&self) -> Result<GeneralExtractor> {
        let pipeline = self
            .pipeline
            .clone()
            .ok_or_else(|| GeolocError::ModelUnavailable("toolkit model not loaded".into()))?;
        Ok(GeneralExtractor::new(pipeline))
    }

    pub fn bilstm_extractor(&self) -> Result<BiLstmExtractor> {
        let bundle = self
            .tagger
            .clone()
            .ok_or_else(|| GeolocError::ModelUnavailable("BiLSTM-CRF model or mappings not loaded".into()))?;
        let pipeline = self
            .pipeline
            .clone()
            .ok_or_else(|| GeolocError::ModelUnavailable("tokenizer not loaded".into()))?;
        Ok(BiLstmExtractor::new(pipeline, bundle))
    }

    pub fn extractor(&self, kind: ModelKind) -> Result<Box<dyn LocationExtractor>> {
        Ok(match kind {
            ModelKind::Toolkit => Box::new(self.general_extractor()?),
            ModelKind::Bilstm => Box::new(self.bilstm_extractor()?),
        })
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            toolkit_loaded: self.pipeline.is_some(),
            tagger_loaded: self.tagger.is_some(),
            vocab_size: self.tagger.as_ref().map(|t| t.vocab.len()),
            num_tags: self.tagger.as_ref().map(|t| t.tags.len()),
        }
    }
}
