//! Standard scaling of the classical feature matrix.

use crate::error::{ActimateError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-feature mean and population standard deviation.
///
/// A zero-variance feature is scaled by 1 so it maps to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScaler {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
}

#[derive(Serialize, Deserialize)]
struct ScalerFile {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl FeatureScaler {
    pub fn fit(features: &Array2<f32>) -> Result<Self> {
        let rows = features.nrows();
        if rows == 0 {
            return Err(ActimateError::InsufficientData {
                message: "cannot fit a scaler on zero rows".to_string(),
            });
        }
        let as_f64 = features.mapv(f64::from);
        let mean = as_f64
            .mean_axis(Axis(0))
            .ok_or_else(|| ActimateError::InsufficientData {
                message: "cannot fit a scaler on zero rows".to_string(),
            })?;
        let std = as_f64.std_axis(Axis(0), 0.0);

        Ok(Self {
            mean: mean.mapv(|m| m as f32),
            std: std.mapv(|s| if s == 0.0 { 1.0 } else { s as f32 }),
        })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// `(x - mean) * (1 / std)` per feature.
    pub fn transform(&self, features: &Array2<f32>) -> Result<Array2<f32>> {
        if features.ncols() != self.width() {
            return Err(ActimateError::ShapeMismatch {
                expected: format!("{} features", self.width()),
                actual: format!("{} features", features.ncols()),
            });
        }
        let scale = self.std.mapv(|s| 1.0 / s);
        let mut out = features.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row *= &scale;
        }
        Ok(out)
    }

    /// Offset/scale pair for `y = (x - offset) * scale`.
    pub fn offset_scale(&self) -> (Vec<f32>, Vec<f32>) {
        (
            self.mean.to_vec(),
            self.std.iter().map(|s| 1.0 / s).collect(),
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ScalerFile {
            mean: self.mean.iter().map(|&v| f64::from(v)).collect(),
            std: self.std.iter().map(|&v| f64::from(v)).collect(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: ScalerFile = serde_json::from_str(&fs::read_to_string(path)?)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn scaled_training_columns_are_standardized() {
        let x = array![[1.0f32, 10.0, 7.0], [2.0, 20.0, 7.0], [3.0, 30.0, 7.0], [6.0, 0.0, 7.0]];
        let scaler = FeatureScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();

        for c in 0..2 {
            let column = scaled.column(c);
            let mean = column.sum() / 4.0;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(var.sqrt(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn constant_feature_maps_to_zero() {
        let x = array![[1.0f32, 7.0], [2.0, 7.0]];
        let scaler = FeatureScaler::fit(&x).unwrap();
        assert_eq!(scaler.std[1], 1.0);
        let scaled = scaler.transform(&x).unwrap();
        assert_eq!(scaled[[0, 1]], 0.0);
        assert_eq!(scaled[[1, 1]], 0.0);
    }

    #[test]
    fn offset_scale_matches_transform() {
        let x = array![[1.0f32, -4.0], [3.0, 8.0], [5.0, 2.0]];
        let scaler = FeatureScaler::fit(&x).unwrap();
        let (offset, scale) = scaler.offset_scale();
        let scaled = scaler.transform(&x).unwrap();
        for c in 0..2 {
            assert_abs_diff_eq!((x[[2, c]] - offset[c]) * scale[c], scaled[[2, c]], epsilon = 1e-5);
        }
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let scaler = FeatureScaler::fit(&array![[1.0f32, 2.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0f32, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn empty_matrix_is_rejected() {
        assert!(FeatureScaler::fit(&Array2::<f32>::zeros((0, 4))).is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let scaler = FeatureScaler::fit(&array![[0.1f32, 3.3], [0.7, -1.9], [0.2, 8.8]]).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("feature_scaler.json");
        scaler.save(&path).unwrap();
        assert_eq!(FeatureScaler::load(&path).unwrap(), scaler);
    }
}
