//! BiLSTM-CRF sequence tagger
//!
//! Inference-only embedding -> stacked bidirectional LSTM -> linear -> CRF
//! network. The first three stages are `candle_nn` layers; the CRF decode
//! runs on `ndarray`. Weights come from a safetensors export of the trained
//! model's state dict, using the state-dict tensor names:
//!
//! - `embedding.weight` `[V, E]`
//! - `lstm.weight_ih_l{k}` / `lstm.weight_hh_l{k}` / `lstm.bias_ih_l{k}` /
//!   `lstm.bias_hh_l{k}`, plus the same with a `_reverse` suffix
//! - `hidden2tag.weight` `[T, 2H]`, `hidden2tag.bias` `[T]`
//! - `crf.start_transitions` `[T]`, `crf.end_transitions` `[T]`,
//!   `crf.transitions` `[T, T]`
//!
//! Dropout is a training-time layer and has no effect here.

mod crf;
mod lstm;
mod weights;

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Embedding, Linear, VarBuilder};
use ndarray::{Array1, Array2};
use thiserror::Error;
use tracing::{debug, info};

use geoloc_core::{GeolocError, ModelConfig, Result};

use crf::Crf;
use lstm::BiLstm;

/// Hyper-parameters the weight file must agree with
#[derive(Debug, Clone, PartialEq)]
pub struct TaggerConfig {
    pub vocab_size: usize,
    pub embed_dim: usize,
    pub lstm_units: usize,
    pub num_tags: usize,
    pub num_layers: usize,
    pub dropout: f32,
    pub padding_idx: u32,
}

impl TaggerConfig {
    /// Architecture from configuration plus the sizes of the loaded mappings
    pub fn from_model_config(config: &ModelConfig, vocab_size: usize, num_tags: usize) -> Self {
        Self {
            vocab_size,
            embed_dim: config.embed_dim,
            lstm_units: config.lstm_units,
            num_tags,
            num_layers: config.num_layers,
            dropout: config.dropout,
            padding_idx: config.pad_idx,
        }
    }

    fn validate(&self) -> std::result::Result<(), TaggerError> {
        let sizes = [
            ("vocab_size", self.vocab_size),
            ("embed_dim", self.embed_dim),
            ("lstm_units", self.lstm_units),
            ("num_tags", self.num_tags),
            ("num_layers", self.num_layers),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(TaggerError::InvalidConfig(format!("{name} must be positive")));
        }
        if self.padding_idx as usize >= self.vocab_size {
            return Err(TaggerError::InvalidConfig(format!(
                "padding index {} outside vocabulary of {}",
                self.padding_idx, self.vocab_size
            )));
        }
        Ok(())
    }
}

/// Errors raised while loading or running the tagger
#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("missing tensor: {0}")]
    MissingTensor(String),

    #[error("unexpected tensors: {}", .0.join(", "))]
    UnexpectedTensors(Vec<String>),

    #[error("tensor {name} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("tensor {name} has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },

    #[error("invalid weight file: {0}")]
    Format(String),

    #[error("invalid tagger configuration: {0}")]
    InvalidConfig(String),

    #[error("token id {id} outside embedding table of {vocab_size}")]
    IdOutOfRange { id: u32, vocab_size: usize },

    #[error("invalid mask: {0}")]
    InvalidMask(String),

    #[error("{ids} ids but {mask} mask entries")]
    LengthMismatch { ids: usize, mask: usize },

    #[error("non-finite path score")]
    NonFinite,

    #[error("tensor computation failed: {0}")]
    Compute(#[from] candle_core::Error),
}

impl TaggerError {
    /// Whether this error happened while running a loaded model
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            Self::IdOutOfRange { .. } | Self::InvalidMask(_) | Self::LengthMismatch { .. } | Self::NonFinite | Self::Compute(_)
        )
    }
}

impl From<TaggerError> for GeolocError {
    fn from(err: TaggerError) -> Self {
        if err.is_runtime() {
            GeolocError::InferenceFailure(err.to_string())
        } else {
            GeolocError::ArchitectureMismatch(err.to_string())
        }
    }
}

/// Maps a padded id sequence and its mask to one tag index per valid position
pub trait SequenceDecoder: Send + Sync {
    fn decode(&self, ids: &[u32], mask: &[bool]) -> Result<Vec<usize>>;
}

/// Loaded BiLSTM-CRF network
pub struct BiLstmCrf {
    config: TaggerConfig,
    device: Device,
    embedding: Embedding,
    encoder: BiLstm,
    /// `2H -> T`
    projection: Linear,
    crf: Crf,
}

impl std::fmt::Debug for BiLstmCrf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiLstmCrf").field("config", &self.config).finish()
    }
}

impl BiLstmCrf {
    /// Read and validate a safetensors weight file
    pub fn load(path: &Path, config: TaggerConfig) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| GeolocError::artifact(path, e.to_string()))?;
        let model = Self::from_safetensors(&bytes, config).map_err(|e| match e {
            TaggerError::Format(msg) => GeolocError::artifact(path, msg),
            other => GeolocError::from(other),
        })?;

        info!(
            path = %path.display(),
            vocab = model.config.vocab_size,
            tags = model.config.num_tags,
            layers = model.config.num_layers,
            "BiLSTM-CRF weights loaded"
        );
        Ok(model)
    }

    /// Build the network from in-memory safetensors bytes.
    ///
    /// Every expected tensor must be present with the exact shape implied by
    /// `config`, and no other tensors may be present.
    pub fn from_safetensors(bytes: &[u8], config: TaggerConfig) -> std::result::Result<Self, TaggerError> {
        config.validate()?;
        let device = Device::Cpu;
        let tensors = weights::load_checked(bytes, &config, &device)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        Self::build(vb, config, device).map_err(|e| TaggerError::Format(e.to_string()))
    }

    fn build(vb: VarBuilder, config: TaggerConfig, device: Device) -> candle_core::Result<Self> {
        let h = config.lstm_units;
        let t = config.num_tags;
        let embedding = candle_nn::embedding(config.vocab_size, config.embed_dim, vb.pp("embedding"))?;
        let encoder = BiLstm::load(vb.pp("lstm"), config.num_layers, config.embed_dim, h)?;
        let projection = candle_nn::linear(2 * h, t, vb.pp("hidden2tag"))?;

        let crf = vb.pp("crf");
        let crf = Crf::new(
            Array1::from_vec(crf.get(t, "start_transitions")?.to_vec1::<f32>()?),
            Array1::from_vec(crf.get(t, "end_transitions")?.to_vec1::<f32>()?),
            to_array2(&crf.get((t, t), "transitions")?)?,
        );

        Ok(Self {
            config,
            device,
            embedding,
            encoder,
            projection,
            crf,
        })
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    /// Per-position tag scores, `[len, T]`, over the whole id sequence
    pub fn emit(&self, ids: &[u32]) -> std::result::Result<Array2<f32>, TaggerError> {
        let vocab_size = self.config.vocab_size;
        if let Some(&id) = ids.iter().find(|id| **id as usize >= vocab_size) {
            return Err(TaggerError::IdOutOfRange { id, vocab_size });
        }
        if ids.is_empty() {
            return Ok(Array2::zeros((0, self.config.num_tags)));
        }

        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let embedded = self.embedding.forward(&input)?;
        let encoded = self.encoder.forward(&embedded)?.squeeze(0)?;
        let emissions = self.projection.forward(&encoded)?;
        Ok(to_array2(&emissions)?)
    }

    /// Viterbi-decode the valid prefix of `ids`.
    ///
    /// `mask` must be a non-empty run of `true` followed only by `false`.
    pub fn decode_tags(&self, ids: &[u32], mask: &[bool]) -> std::result::Result<Vec<usize>, TaggerError> {
        if ids.len() != mask.len() {
            return Err(TaggerError::LengthMismatch {
                ids: ids.len(),
                mask: mask.len(),
            });
        }
        let len = mask.iter().take_while(|m| **m).count();
        if len == 0 {
            return Err(TaggerError::InvalidMask("first position must be valid".into()));
        }
        if mask[len..].iter().any(|m| *m) {
            return Err(TaggerError::InvalidMask("valid positions must form a prefix".into()));
        }

        let emissions = self.emit(ids)?;
        let path = self.crf.viterbi(emissions.view(), len)?;
        debug!(len, padded = ids.len() - len, "viterbi decode");
        Ok(path)
    }
}

impl SequenceDecoder for BiLstmCrf {
    fn decode(&self, ids: &[u32], mask: &[bool]) -> Result<Vec<usize>> {
        Ok(self.decode_tags(ids, mask)?)
    }
}

fn to_array2(tensor: &Tensor) -> candle_core::Result<Array2<f32>> {
    let (rows, cols) = tensor.dims2()?;
    let data = tensor.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array2::from_shape_fn((rows, cols), |(r, c)| data[r * cols + c]))
}
