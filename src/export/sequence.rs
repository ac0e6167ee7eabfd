//! Portable document for the recurrent classifier.
//!
//! The document lists the layers in forward order and carries every weight
//! tensor inline, together with the normalization the model expects on its
//! input. LSTM gate blocks are stacked input, forget, cell, output.

use crate::defaults;
use crate::error::{ActimateError, Result};
use crate::export::{FORMAT_VERSION, TensorSpec, producer};
use crate::features::NormalizationParams;
use crate::sequence::architecture::{Architecture, layer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const INPUT_NAME: &str = "input";
pub const OUTPUT_NAME: &str = "probabilities";
pub const MODEL_NAME: &str = "activity_lstm_model";
pub const GATE_ORDER: &str = "ifgo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Softmax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Two LSTMs over the sequence, the second on the time-reversed input;
    /// outputs are concatenated per step.
    Bidirectional {
        forward: String,
        backward: String,
        input_size: usize,
        hidden_size: usize,
    },
    Lstm {
        name: String,
        input_size: usize,
        hidden_size: usize,
        /// Emit every step rather than only the last one.
        return_sequences: bool,
    },
    BatchNorm {
        name: String,
        features: usize,
        epsilon: f64,
    },
    /// Identity at inference.
    Dropout { rate: f32 },
    Dense {
        name: String,
        input_size: usize,
        units: usize,
        activation: Activation,
    },
}

impl LayerSpec {
    /// Weight names and shapes this layer reads.
    pub fn expected_weights(&self) -> Vec<(String, Vec<usize>)> {
        fn lstm(name: &str, input: usize, hidden: usize) -> Vec<(String, Vec<usize>)> {
            vec![
                (format!("{}.weight_ih_l0", name), vec![4 * hidden, input]),
                (format!("{}.weight_hh_l0", name), vec![4 * hidden, hidden]),
                (format!("{}.bias_ih_l0", name), vec![4 * hidden]),
                (format!("{}.bias_hh_l0", name), vec![4 * hidden]),
            ]
        }
        match self {
            LayerSpec::Bidirectional {
                forward,
                backward,
                input_size,
                hidden_size,
            } => {
                let mut weights = lstm(forward, *input_size, *hidden_size);
                weights.extend(lstm(backward, *input_size, *hidden_size));
                weights
            }
            LayerSpec::Lstm {
                name,
                input_size,
                hidden_size,
                ..
            } => lstm(name, *input_size, *hidden_size),
            LayerSpec::BatchNorm { name, features, .. } => {
                ["weight", "bias", "running_mean", "running_var"]
                    .iter()
                    .map(|w| (format!("{}.{}", name, w), vec![*features]))
                    .collect()
            }
            LayerSpec::Dropout { .. } => Vec::new(),
            LayerSpec::Dense {
                name,
                input_size,
                units,
                ..
            } => vec![
                (format!("{}.weight", name), vec![*units, *input_size]),
                (format!("{}.bias", name), vec![*units]),
            ],
        }
    }
}

/// Layer list of the stacked classifier, in forward order.
pub fn layers(arch: &Architecture) -> Vec<LayerSpec> {
    let bi_width = 2 * arch.lstm_hidden;
    let norm = |name: &str, features: usize| LayerSpec::BatchNorm {
        name: name.to_string(),
        features,
        epsilon: 1e-3,
    };
    vec![
        LayerSpec::Bidirectional {
            forward: layer::BILSTM_FORWARD.to_string(),
            backward: layer::BILSTM_BACKWARD.to_string(),
            input_size: arch.channels,
            hidden_size: arch.lstm_hidden,
        },
        norm(layer::NORM1, bi_width),
        LayerSpec::Dropout {
            rate: arch.recurrent_dropout,
        },
        LayerSpec::Lstm {
            name: layer::LSTM2.to_string(),
            input_size: bi_width,
            hidden_size: arch.lstm2_hidden,
            return_sequences: false,
        },
        norm(layer::NORM2, arch.lstm2_hidden),
        LayerSpec::Dropout {
            rate: arch.recurrent_dropout,
        },
        LayerSpec::Dense {
            name: layer::DENSE.to_string(),
            input_size: arch.lstm2_hidden,
            units: arch.dense_hidden,
            activation: Activation::Relu,
        },
        norm(layer::NORM3, arch.dense_hidden),
        LayerSpec::Dropout {
            rate: arch.dense_dropout,
        },
        LayerSpec::Dense {
            name: layer::HEAD.to_string(),
            input_size: arch.dense_hidden,
            units: arch.n_classes,
            activation: Activation::Softmax,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTensor {
    pub name: String,
    pub shape: Vec<usize>,
    /// Row-major values, widened from f32.
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStage {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableSequenceModel {
    pub format: String,
    pub producer: String,
    pub model: String,
    pub input: TensorSpec,
    pub output: TensorSpec,
    pub classes: Vec<String>,
    pub gate_order: String,
    pub normalization: NormalizationStage,
    pub layers: Vec<LayerSpec>,
    pub weights: Vec<WeightTensor>,
}

fn unsupported(message: impl Into<String>) -> ActimateError {
    ActimateError::UnsupportedModelStructure {
        model: MODEL_NAME.to_string(),
        message: message.into(),
    }
}

impl PortableSequenceModel {
    /// Assemble and validate a document from raw parts.
    pub fn new(
        arch: &Architecture,
        params: &NormalizationParams,
        classes: &[String],
        weights: Vec<WeightTensor>,
    ) -> Result<Self> {
        let doc = Self {
            format: format!("actimate.sequence/{}", FORMAT_VERSION),
            producer: producer(),
            model: MODEL_NAME.to_string(),
            input: TensorSpec::new(
                INPUT_NAME,
                vec![None, Some(arch.window_len), Some(arch.channels)],
            ),
            output: TensorSpec::new(OUTPUT_NAME, vec![None, Some(arch.n_classes)]),
            classes: classes.to_vec(),
            gate_order: GATE_ORDER.to_string(),
            normalization: NormalizationStage {
                mean: params.mean.iter().map(|&v| f64::from(v)).collect(),
                std: params.std.iter().map(|&v| f64::from(v)).collect(),
            },
            layers: layers(arch),
            weights,
        };
        doc.validate()?;
        Ok(doc)
    }

    /// Export a trained model.
    #[cfg(feature = "sequence")]
    pub fn from_model(
        model: &crate::sequence::SequenceModel,
        params: &NormalizationParams,
        classes: &[String],
    ) -> Result<Self> {
        let weights = model
            .named_tensors()?
            .into_iter()
            .map(|t| WeightTensor {
                name: t.name,
                shape: t.shape,
                data: t.data.into_iter().map(f64::from).collect(),
            })
            .collect();
        Self::new(&model.arch, params, classes, weights)
    }

    /// Check that the input declaration, normalization and weights agree
    /// with the layer list.
    pub fn validate(&self) -> Result<()> {
        let channels = match self.input.shape.as_slice() {
            [None, Some(_), Some(channels)] => *channels,
            other => {
                return Err(unsupported(format!(
                    "input shape {:?} is not [batch, steps, channels]",
                    other
                )));
            }
        };
        if self.normalization.mean.len() != channels || self.normalization.std.len() != channels
        {
            return Err(unsupported(format!(
                "normalization covers {} channels, input has {}",
                self.normalization.mean.len(),
                channels
            )));
        }

        match self.layers.first() {
            Some(LayerSpec::Bidirectional { input_size, .. })
            | Some(LayerSpec::Lstm { input_size, .. })
                if *input_size == channels => {}
            _ => {
                return Err(unsupported(
                    "first layer must be recurrent over the input channels",
                ));
            }
        }
        match self.layers.last() {
            Some(LayerSpec::Dense { units, .. }) if *units == self.classes.len() => {}
            _ => {
                return Err(unsupported(format!(
                    "last layer must be dense with {} units",
                    self.classes.len()
                )));
            }
        }

        let by_name: HashMap<&str, &WeightTensor> =
            self.weights.iter().map(|w| (w.name.as_str(), w)).collect();
        for spec in &self.layers {
            for (name, shape) in spec.expected_weights() {
                let tensor = by_name
                    .get(name.as_str())
                    .ok_or_else(|| unsupported(format!("missing weight {}", name)))?;
                if tensor.shape != shape {
                    return Err(unsupported(format!(
                        "weight {} has shape {:?}, expected {:?}",
                        name, tensor.shape, shape
                    )));
                }
                let len: usize = shape.iter().product();
                if tensor.data.len() != len {
                    return Err(unsupported(format!(
                        "weight {} holds {} values, shape needs {}",
                        name,
                        tensor.data.len(),
                        len
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.model, defaults::PORTABLE_SUFFIX)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let doc: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        doc.validate()?;
        Ok(doc)
    }
}
