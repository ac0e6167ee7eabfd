//! Tree-ensemble classifiers over summary feature vectors.

pub mod adaboost;
pub mod forest;
pub mod gbt;
pub mod metrics;
pub mod model;
pub mod tree;

pub use adaboost::AdaBoost;
pub use forest::RandomForest;
pub use gbt::{BoostingParams, GradientBoosting};
pub use metrics::{ClassificationReport, accuracy};
pub use model::{ClassicalModel, ModelKind};
pub use tree::Tree;

use ndarray::{Array2, ArrayView1};

/// A fitted multi-class classifier over fixed-width feature rows.
pub trait Classifier {
    fn n_classes(&self) -> usize;

    /// Class probabilities for one feature row.
    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Vec<f32>;

    /// Most likely class for one feature row.
    fn predict_one(&self, row: ArrayView1<'_, f32>) -> usize {
        argmax(&self.predict_proba(row))
    }

    /// Predicted class per row of `x`.
    fn predict(&self, x: &Array2<f32>) -> Vec<usize> {
        x.outer_iter().map(|row| self.predict_one(row)).collect()
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Numerically stable softmax.
pub fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Well separated clusters: class `k` is centred at `10·k` on every
    /// feature with uniform noise in `[-1, 1]`.
    pub fn blobs(
        per_class: usize,
        n_classes: usize,
        n_features: usize,
        seed: u64,
    ) -> (Array2<f32>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = per_class * n_classes;
        let y: Vec<usize> = (0..n).map(|i| i % n_classes).collect();
        let x = Array2::from_shape_fn((n, n_features), |(i, _)| {
            y[i] as f32 * 10.0 + rng.gen_range(-1.0f32..1.0)
        });
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_tie() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let a = softmax(&[1.0, 2.0, 3.0]);
        let b = softmax(&[1001.0, 1002.0, 1003.0]);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
        assert!((a.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }
}
