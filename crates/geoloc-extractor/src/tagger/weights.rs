//! Strict reading of a safetensors state dict
//!
//! The file must hold exactly the tensors a network of the configured
//! shape has, each with its exact shape, as F32 or F64.

use std::collections::{HashMap, HashSet};

use candle_core::{DType, Device, Tensor};

use super::{TaggerConfig, TaggerError};

/// Every tensor name and shape the network reads, in load order
pub(crate) fn expected_shapes(config: &TaggerConfig) -> Vec<(String, Vec<usize>)> {
    let h = config.lstm_units;
    let t = config.num_tags;
    let mut shapes = vec![("embedding.weight".to_string(), vec![config.vocab_size, config.embed_dim])];
    for layer in 0..config.num_layers {
        let input = if layer == 0 { config.embed_dim } else { 2 * h };
        for suffix in ["", "_reverse"] {
            shapes.push((format!("lstm.weight_ih_l{layer}{suffix}"), vec![4 * h, input]));
            shapes.push((format!("lstm.weight_hh_l{layer}{suffix}"), vec![4 * h, h]));
            shapes.push((format!("lstm.bias_ih_l{layer}{suffix}"), vec![4 * h]));
            shapes.push((format!("lstm.bias_hh_l{layer}{suffix}"), vec![4 * h]));
        }
    }
    shapes.push(("hidden2tag.weight".to_string(), vec![t, 2 * h]));
    shapes.push(("hidden2tag.bias".to_string(), vec![t]));
    shapes.push(("crf.start_transitions".to_string(), vec![t]));
    shapes.push(("crf.end_transitions".to_string(), vec![t]));
    shapes.push(("crf.transitions".to_string(), vec![t, t]));
    shapes
}

/// Decode `bytes` and check them against `config`; tensors come back as F32
pub(crate) fn load_checked(
    bytes: &[u8],
    config: &TaggerConfig,
    device: &Device,
) -> Result<HashMap<String, Tensor>, TaggerError> {
    let mut tensors =
        candle_core::safetensors::load_buffer(bytes, device).map_err(|e| TaggerError::Format(e.to_string()))?;

    for (name, tensor) in tensors.iter_mut() {
        match tensor.dtype() {
            DType::F32 => {}
            DType::F64 => {
                *tensor = tensor
                    .to_dtype(DType::F32)
                    .map_err(|e| TaggerError::Format(format!("{name}: {e}")))?;
            }
            other => {
                return Err(TaggerError::UnsupportedDtype {
                    name: name.clone(),
                    dtype: format!("{other:?}"),
                })
            }
        }
    }

    let expected = expected_shapes(config);
    for (name, shape) in &expected {
        let tensor = tensors
            .get(name)
            .ok_or_else(|| TaggerError::MissingTensor(name.clone()))?;
        if tensor.dims() != shape.as_slice() {
            return Err(TaggerError::ShapeMismatch {
                name: name.clone(),
                expected: shape.clone(),
                actual: tensor.dims().to_vec(),
            });
        }
    }

    let known: HashSet<&str> = expected.iter().map(|(name, _)| name.as_str()).collect();
    let mut unexpected: Vec<String> = tensors
        .keys()
        .filter(|name| !known.contains(name.as_str()))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        return Err(TaggerError::UnexpectedTensors(unexpected));
    }

    Ok(tensors)
}
