//! Multi-class AdaBoost (SAMME) over decision stumps.

use crate::ensemble::forest::check_training_set;
use crate::ensemble::{Classifier, argmax, softmax};
use crate::ensemble::tree::{ClassificationTreeBuilder, Tree};
use crate::error::{ActimateError, Result};
use ndarray::{Array2, ArrayView1};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoost {
    pub stumps: Vec<Tree>,
    /// Vote weight of each stump.
    pub alphas: Vec<f32>,
    pub n_classes: usize,
    pub n_features: usize,
}

impl AdaBoost {
    pub fn fit(
        x: &Array2<f32>,
        y: &[usize],
        n_classes: usize,
        n_estimators: usize,
        learning_rate: f32,
        seed: u64,
    ) -> Result<Self> {
        check_training_set(x, y, n_classes)?;
        if n_classes < 2 {
            return Err(ActimateError::Training {
                message: "AdaBoost needs at least two classes".to_string(),
            });
        }

        let n = x.nrows();
        let k = n_classes as f64;
        let indices: Vec<usize> = (0..n).collect();
        let builder = ClassificationTreeBuilder {
            max_depth: Some(1),
            ..ClassificationTreeBuilder::new(n_classes)
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = vec![1.0f32 / n as f32; n];
        let mut stumps = Vec::new();
        let mut alphas = Vec::new();

        for round in 0..n_estimators {
            let stump = builder.fit(x, y, &weights, &indices, &mut rng);
            let missed: Vec<bool> = (0..n)
                .map(|i| argmax(stump.leaf_value(x.row(i))) != y[i])
                .collect();
            let total: f64 = weights.iter().map(|&w| f64::from(w)).sum();
            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|(_, m)| **m)
                .map(|(&w, _)| f64::from(w))
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                debug!("AdaBoost: perfect stump at round {}, stopping", round);
                stumps.push(stump);
                alphas.push(1.0);
                break;
            }
            if error >= 1.0 - 1.0 / k {
                if stumps.is_empty() {
                    return Err(ActimateError::Training {
                        message: "AdaBoost base estimator is no better than chance".to_string(),
                    });
                }
                debug!("AdaBoost: stump at round {} no better than chance, stopping", round);
                break;
            }

            let alpha = f64::from(learning_rate) * (((1.0 - error) / error).ln() + (k - 1.0).ln());
            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m && *w > 0.0 {
                    *w = (f64::from(*w) * alpha.exp()) as f32;
                }
            }
            let sum: f32 = weights.iter().sum();
            if sum <= 0.0 || !sum.is_finite() {
                stumps.push(stump);
                alphas.push(alpha as f32);
                break;
            }
            weights.iter_mut().for_each(|w| *w /= sum);

            stumps.push(stump);
            alphas.push(alpha as f32);
        }

        Ok(Self {
            stumps,
            alphas,
            n_classes,
            n_features: x.ncols(),
        })
    }

    /// Per-stump vote weight: alpha divided by the total alpha and by `K - 1`.
    pub fn vote_weights(&self) -> Vec<f32> {
        let total: f32 = self.alphas.iter().sum();
        let scale = 1.0 / (self.n_classes.max(2) - 1) as f32;
        self.alphas
            .iter()
            .map(|a| if total > 0.0 { a / total * scale } else { 0.0 })
            .collect()
    }

    /// Weighted class votes; each stump votes for its majority class.
    pub fn decision(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        let mut votes = vec![0.0f32; self.n_classes];
        for (stump, weight) in self.stumps.iter().zip(self.vote_weights()) {
            votes[argmax(stump.leaf_value(row))] += weight;
        }
        votes
    }
}

impl Classifier for AdaBoost {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Softmax over the weighted votes.
    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        softmax(&self.decision(row))
    }
}
