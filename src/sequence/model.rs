//! Stacked recurrent classifier over normalized sensor windows.
//!
//! ```text
//! (batch, 50, 9)
//!   -> BiLSTM(64 per direction, every step) -> BatchNorm -> Dropout
//!   -> LSTM(32, last step)                  -> BatchNorm -> Dropout
//!   -> Dense(16, ReLU)                      -> BatchNorm -> Dropout
//!   -> Dense(5) logits
//! ```

use crate::error::{ActimateError, Result};
use crate::sequence::architecture::{Architecture, layer};
use candle_core::{D, DType, Device, Tensor};
use candle_nn::{
    BatchNorm, BatchNormConfig, Dropout, LSTM, LSTMConfig, Linear, Module, ModuleT, RNN,
    VarBuilder, VarMap,
};
use ndarray::{Array2, Array3, Axis};
use std::path::Path;

fn norm_config() -> BatchNormConfig {
    BatchNormConfig {
        eps: 1e-3,
        momentum: 0.01,
        ..Default::default()
    }
}

pub struct BiLstmClassifier {
    lstm_fwd: LSTM,
    lstm_bwd: LSTM,
    norm1: BatchNorm,
    lstm2: LSTM,
    norm2: BatchNorm,
    dense: Linear,
    norm3: BatchNorm,
    head: Linear,
    recurrent_dropout: Dropout,
    dense_dropout: Dropout,
}

impl BiLstmClassifier {
    pub fn new(arch: &Architecture, vb: VarBuilder) -> Result<Self> {
        let bi_width = 2 * arch.lstm_hidden;
        Ok(Self {
            lstm_fwd: candle_nn::lstm(
                arch.channels,
                arch.lstm_hidden,
                LSTMConfig::default(),
                vb.pp(layer::BILSTM_FORWARD),
            )?,
            lstm_bwd: candle_nn::lstm(
                arch.channels,
                arch.lstm_hidden,
                LSTMConfig::default(),
                vb.pp(layer::BILSTM_BACKWARD),
            )?,
            norm1: candle_nn::batch_norm(bi_width, norm_config(), vb.pp(layer::NORM1))?,
            lstm2: candle_nn::lstm(
                bi_width,
                arch.lstm2_hidden,
                LSTMConfig::default(),
                vb.pp(layer::LSTM2),
            )?,
            norm2: candle_nn::batch_norm(arch.lstm2_hidden, norm_config(), vb.pp(layer::NORM2))?,
            dense: candle_nn::linear(arch.lstm2_hidden, arch.dense_hidden, vb.pp(layer::DENSE))?,
            norm3: candle_nn::batch_norm(arch.dense_hidden, norm_config(), vb.pp(layer::NORM3))?,
            head: candle_nn::linear(arch.dense_hidden, arch.n_classes, vb.pp(layer::HEAD))?,
            recurrent_dropout: Dropout::new(arch.recurrent_dropout),
            dense_dropout: Dropout::new(arch.dense_dropout),
        })
    }

    /// Class logits for a `(batch, steps, channels)` input.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = xs.contiguous()?;
        let forward = self.lstm_fwd.states_to_tensor(&self.lstm_fwd.seq(&xs)?)?;
        let reversed = reverse_steps(&xs)?;
        let backward = self
            .lstm_bwd
            .states_to_tensor(&self.lstm_bwd.seq(&reversed)?)?;
        let backward = reverse_steps(&backward)?;
        let hidden = Tensor::cat(&[&forward, &backward], 2)?;

        // batch norm expects channels on dim 1
        let hidden = hidden.transpose(1, 2)?.contiguous()?;
        let hidden = self.norm1.forward_t(&hidden, train)?;
        let hidden = hidden.transpose(1, 2)?.contiguous()?;
        let hidden = self.recurrent_dropout.forward_t(&hidden, train)?;

        let states = self.lstm2.seq(&hidden)?;
        let last = states
            .last()
            .ok_or_else(|| ActimateError::Training {
                message: "empty input sequence".to_string(),
            })?
            .h()
            .clone();
        let last = self.norm2.forward_t(&last, train)?;
        let last = self.recurrent_dropout.forward_t(&last, train)?;

        let dense = self.dense.forward(&last)?.relu()?;
        let dense = self.norm3.forward_t(&dense, train)?;
        let dense = self.dense_dropout.forward_t(&dense, train)?;
        Ok(self.head.forward(&dense)?)
    }
}

/// Flip a `(batch, steps, features)` tensor along the step axis.
fn reverse_steps(xs: &Tensor) -> Result<Tensor> {
    let steps = xs.dim(1)?;
    let order: Vec<u32> = (0..steps as u32).rev().collect();
    let index = Tensor::from_vec(order, steps, xs.device())?;
    Ok(xs.index_select(&index, 1)?)
}

/// Copy the rows at `indices` of a window stack into one input tensor.
pub fn batch_tensor(windows: &Array3<f32>, indices: &[usize], device: &Device) -> Result<Tensor> {
    let (_, steps, channels) = windows.dim();
    let mut data = Vec::with_capacity(indices.len() * steps * channels);
    for &i in indices {
        data.extend(windows.index_axis(Axis(0), i).iter().copied());
    }
    Ok(Tensor::from_vec(data, (indices.len(), steps, channels), device)?)
}

pub fn label_tensor(labels: &[usize], indices: &[usize], device: &Device) -> Result<Tensor> {
    let data: Vec<u32> = indices.iter().map(|&i| labels[i] as u32).collect();
    Ok(Tensor::from_vec(data, indices.len(), device)?)
}

/// A classifier together with the variable store that owns its weights.
pub struct SequenceModel {
    pub arch: Architecture,
    varmap: VarMap,
    network: BiLstmClassifier,
    device: Device,
}

/// One named weight tensor in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl SequenceModel {
    /// Freshly initialized weights on the CPU.
    pub fn new(arch: Architecture) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let network = BiLstmClassifier::new(&arch, vb)?;
        Ok(Self {
            arch,
            varmap,
            network,
            device,
        })
    }

    /// Build the network and overwrite its weights from a safetensors file.
    pub fn load(arch: Architecture, path: &Path) -> Result<Self> {
        let mut model = Self::new(arch)?;
        model.varmap.load(path)?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn network(&self) -> &BiLstmClassifier {
        &self.network
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Every weight tensor, sorted by name.
    pub fn named_tensors(&self) -> Result<Vec<NamedTensor>> {
        let data = self.varmap.data().lock().map_err(|e| ActimateError::Training {
            message: format!("weight store lock poisoned: {}", e),
        })?;
        let mut tensors = data
            .iter()
            .map(|(name, var)| {
                let tensor = var.as_tensor();
                Ok(NamedTensor {
                    name: name.clone(),
                    shape: tensor.dims().to_vec(),
                    data: tensor.flatten_all()?.to_vec1::<f32>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        tensors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tensors)
    }

    /// Detached copies of every weight, for restoring a snapshot later.
    pub fn snapshot(&self) -> Result<Vec<(String, Tensor)>> {
        let data = self.varmap.data().lock().map_err(|e| ActimateError::Training {
            message: format!("weight store lock poisoned: {}", e),
        })?;
        data.iter()
            .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
            .collect()
    }

    pub fn restore(&self, snapshot: &[(String, Tensor)]) -> Result<()> {
        let data = self.varmap.data().lock().map_err(|e| ActimateError::Training {
            message: format!("weight store lock poisoned: {}", e),
        })?;
        for (name, tensor) in snapshot {
            if let Some(var) = data.get(name) {
                var.set(tensor)?;
            }
        }
        Ok(())
    }

    /// Mean cross-entropy and accuracy over a labelled window stack.
    pub fn evaluate(
        &self,
        windows: &Array3<f32>,
        labels: &[usize],
        batch_size: usize,
    ) -> Result<(f64, f64)> {
        let n = labels.len();
        if n == 0 {
            return Ok((0.0, 0.0));
        }
        let order: Vec<usize> = (0..n).collect();
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        for chunk in order.chunks(batch_size.max(1)) {
            let xs = batch_tensor(windows, chunk, &self.device)?;
            let ys = label_tensor(labels, chunk, &self.device)?;
            let logits = self.network.forward_t(&xs, false)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &ys)?.to_scalar::<f32>()?;
            loss_sum += f64::from(loss) * chunk.len() as f64;
            correct += count_correct(&logits, &ys)?;
        }
        Ok((loss_sum / n as f64, correct as f64 / n as f64))
    }

    /// Softmax class probabilities, one row per window.
    pub fn predict_proba(&self, windows: &Array3<f32>) -> Result<Array2<f32>> {
        let n = windows.dim().0;
        let indices: Vec<usize> = (0..n).collect();
        let xs = batch_tensor(windows, &indices, &self.device)?;
        let logits = self.network.forward_t(&xs, false)?;
        let proba = candle_nn::ops::softmax(&logits, D::Minus1)?;
        let flat = proba.flatten_all()?.to_vec1::<f32>()?;
        Array2::from_shape_vec((n, self.arch.n_classes), flat).map_err(|e| {
            ActimateError::ShapeMismatch {
                expected: format!("({}, {})", n, self.arch.n_classes),
                actual: e.to_string(),
            }
        })
    }
}

/// Number of rows whose arg-max logit matches the label.
pub fn count_correct(logits: &Tensor, labels: &Tensor) -> Result<usize> {
    let predicted = logits.argmax(D::Minus1)?.to_vec1::<u32>()?;
    let actual = labels.to_vec1::<u32>()?;
    Ok(predicted.iter().zip(&actual).filter(|(p, a)| p == a).count())
}
