//! Stacked bidirectional LSTM encoder (inference only)
//!
//! Each direction is a `candle_nn` LSTM reading the PyTorch state-dict
//! names `weight_ih_l{k}`, `weight_hh_l{k}`, `bias_ih_l{k}`, `bias_hh_l{k}`,
//! with a `_reverse` suffix for the backward direction.

use candle_core::{Result, Tensor, D};
use candle_nn::rnn::{Direction, LSTMConfig};
use candle_nn::{VarBuilder, LSTM, RNN};

pub(crate) struct BiLstmLayer {
    forward: LSTM,
    backward: LSTM,
}

impl BiLstmLayer {
    fn load(vb: VarBuilder, layer: usize, input: usize, hidden: usize) -> Result<Self> {
        let config = |direction| LSTMConfig {
            layer_idx: layer,
            direction,
            ..Default::default()
        };
        Ok(Self {
            forward: candle_nn::lstm(input, hidden, config(Direction::Forward), vb.clone())?,
            backward: candle_nn::lstm(input, hidden, config(Direction::Backward), vb)?,
        })
    }

    /// `[1, steps, input]` -> `[1, steps, 2H]`, laid out [forward | backward]
    /// and indexed by input position in both halves
    fn forward(&self, inputs: &Tensor) -> Result<Tensor> {
        let fwd = run(&self.forward, inputs)?;
        let bwd = reverse_steps(&run(&self.backward, &reverse_steps(inputs)?)?)?;
        Tensor::cat(&[&fwd, &bwd], D::Minus1)
    }
}

/// Stack of bidirectional layers; layer `k > 0` reads the `2H` output of
/// layer `k - 1`
pub(crate) struct BiLstm {
    layers: Vec<BiLstmLayer>,
}

impl BiLstm {
    pub(crate) fn load(vb: VarBuilder, num_layers: usize, input: usize, hidden: usize) -> Result<Self> {
        let layers = (0..num_layers)
            .map(|layer| {
                let input = if layer == 0 { input } else { 2 * hidden };
                BiLstmLayer::load(vb.clone(), layer, input, hidden)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    /// Run from a zero state over every step, padding included
    pub(crate) fn forward(&self, inputs: &Tensor) -> Result<Tensor> {
        let mut current = inputs.clone();
        for layer in &self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }
}

fn run(lstm: &LSTM, inputs: &Tensor) -> Result<Tensor> {
    let states = lstm.seq(inputs)?;
    lstm.states_to_tensor(&states)
}

fn reverse_steps(x: &Tensor) -> Result<Tensor> {
    let steps = x.dim(1)? as u32;
    let order: Vec<u32> = (0..steps).rev().collect();
    let index = Tensor::new(order.as_slice(), x.device())?;
    x.index_select(&index, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    /// One layer with a single hidden unit per direction, driven only by
    /// the input-to-hidden weights
    fn unit(w_ih: [f32; 4]) -> BiLstm {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        for suffix in ["", "_reverse"] {
            tensors.insert(
                format!("weight_ih_l0{suffix}"),
                Tensor::from_slice(&w_ih, (4, 1), &device).unwrap(),
            );
            tensors.insert(
                format!("weight_hh_l0{suffix}"),
                Tensor::zeros((4, 1), DType::F32, &device).unwrap(),
            );
            tensors.insert(format!("bias_ih_l0{suffix}"), Tensor::zeros(4, DType::F32, &device).unwrap());
            tensors.insert(format!("bias_hh_l0{suffix}"), Tensor::zeros(4, DType::F32, &device).unwrap());
        }
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        BiLstm::load(vb, 1, 1, 1).unwrap()
    }

    fn encode(encoder: &BiLstm, inputs: &[f32]) -> Vec<Vec<f32>> {
        let x = Tensor::from_slice(inputs, (1, inputs.len(), 1), &Device::Cpu).unwrap();
        encoder.forward(&x).unwrap().squeeze(0).unwrap().to_vec2::<f32>().unwrap()
    }

    #[test]
    fn test_single_step_matches_lstm_equations() {
        let out = encode(&unit([1.0, 0.0, 2.0, 0.0]), &[1.0]);

        let cell = sigmoid(1.0) * 2.0f32.tanh();
        let expected = 0.5 * cell.tanh();
        assert_eq!(out.len(), 1);
        assert!((out[0][0] - expected).abs() < 1e-5);
        assert!((out[0][1] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_reverse_direction_reads_from_the_end() {
        let out = encode(&unit([1.0, 0.0, 2.0, 0.0]), &[1.0, 0.0]);

        // the zero input seen first leaves the backward state at zero
        assert!(out[1][1].abs() < 1e-6);
        assert!((out[0][1] - out[0][0]).abs() < 1e-5);
        // the forward pass carries cell state into the second step
        assert!(out[1][0] > 0.0);
    }

    #[test]
    fn test_zero_weights_give_zero_output() {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let encoder = BiLstm::load(vb, 2, 3, 2).unwrap();

        let x = Tensor::full(0.7f32, (1, 5, 3), &device).unwrap();
        let out = encoder.forward(&x).unwrap();
        assert_eq!(out.dims(), &[1, 5, 4]);
        let values = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| *v == 0.0));
    }
}
