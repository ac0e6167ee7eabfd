//! Per-channel z-score normalization for the sequence path.
//!
//! Parameters are fitted on the training split only and then applied,
//! unchanged, to every other split and at inference time.

use crate::dataset::Window;
use crate::defaults::STD_EPSILON;
use crate::error::{ActimateError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-channel mean and standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationParams {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
}

/// On-disk form. Values are widened to f64 so that reloading restores the
/// exact f32 bit patterns.
#[derive(Serialize, Deserialize)]
struct ParamsFile {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl NormalizationParams {
    /// Fit mean and population std over every timestep of every window.
    ///
    /// Channels with zero variance get `STD_EPSILON` as their deviation.
    pub fn fit(windows: &[Window]) -> Result<Self> {
        let channels = windows
            .first()
            .map(|w| w.data.ncols())
            .ok_or_else(|| ActimateError::InsufficientData {
                message: "cannot fit normalization on an empty training split".to_string(),
            })?;

        let mut sum = vec![0.0f64; channels];
        let mut count = 0usize;
        for window in windows {
            check_width(&window.data, channels)?;
            for row in window.data.rows() {
                for (acc, &value) in sum.iter_mut().zip(row.iter()) {
                    *acc += f64::from(value);
                }
            }
            count += window.data.nrows();
        }
        if count == 0 {
            return Err(ActimateError::InsufficientData {
                message: "training windows contain no timesteps".to_string(),
            });
        }
        let mean: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();

        let mut squared = vec![0.0f64; channels];
        for window in windows {
            for row in window.data.rows() {
                for (c, &value) in row.iter().enumerate() {
                    let diff = f64::from(value) - mean[c];
                    squared[c] += diff * diff;
                }
            }
        }

        let std = squared
            .iter()
            .map(|sq| {
                let std = (sq / count as f64).sqrt() as f32;
                if std == 0.0 { STD_EPSILON } else { std }
            })
            .collect::<Array1<f32>>();

        Ok(Self {
            mean: mean.iter().map(|&m| m as f32).collect(),
            std,
        })
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// `(x - mean) / std` for one window.
    pub fn normalize(&self, data: &Array2<f32>) -> Result<Array2<f32>> {
        check_width(data, self.channels())?;
        let mut out = data.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.std;
        }
        Ok(out)
    }

    /// Normalize a whole split, keeping labels and offsets.
    pub fn apply(&self, windows: &[Window]) -> Result<Vec<Window>> {
        windows
            .iter()
            .map(|w| {
                Ok(Window {
                    data: self.normalize(&w.data)?,
                    ..w.clone()
                })
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ParamsFile {
            mean: self.mean.iter().map(|&v| f64::from(v)).collect(),
            std: self.std.iter().map(|&v| f64::from(v)).collect(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: ParamsFile = serde_json::from_str(&fs::read_to_string(path)?)?;
        if file.mean.len() != file.std.len() {
            return Err(ActimateError::ShapeMismatch {
                expected: format!("{} std values", file.mean.len()),
                actual: format!("{} std values", file.std.len()),
            });
        }
        Ok(Self {
            mean: file.mean.iter().map(|&v| v as f32).collect(),
            std: file.std.iter().map(|&v| v as f32).collect(),
        })
    }
}

fn check_width(data: &Array2<f32>, channels: usize) -> Result<()> {
    if data.ncols() != channels {
        return Err(ActimateError::ShapeMismatch {
            expected: format!("{} channels", channels),
            actual: format!("{} channels", data.ncols()),
        });
    }
    Ok(())
}
