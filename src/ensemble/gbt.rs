//! Gradient-boosted trees with a softmax objective.
//!
//! Every round fits one second-order regression tree per class on the
//! softmax gradients. Margins start at `base_score` for every class.

use crate::ensemble::{Classifier, softmax};
use crate::ensemble::forest::check_training_set;
use crate::ensemble::tree::{GradientTreeBuilder, Tree};
use crate::error::Result;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Initial margin shared by all classes.
pub const BASE_SCORE: f32 = 0.5;

/// Hessian floor for confident predictions.
const MIN_HESSIAN: f32 = 1e-16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// `trees[round][class]`.
    pub trees: Vec<Vec<Tree>>,
    pub base_score: f32,
    pub n_classes: usize,
    pub n_features: usize,
}

/// Hyperparameters for [`GradientBoosting::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f32,
    pub max_depth: usize,
    pub lambda: f32,
    pub min_child_weight: f32,
}

impl Default for BoostingParams {
    fn default() -> Self {
        use crate::defaults;
        Self {
            n_estimators: defaults::N_ESTIMATORS,
            learning_rate: defaults::GBT_LEARNING_RATE,
            max_depth: defaults::GBT_MAX_DEPTH,
            lambda: defaults::GBT_LAMBDA,
            min_child_weight: defaults::GBT_MIN_CHILD_WEIGHT,
        }
    }
}

impl GradientBoosting {
    pub fn fit(
        x: &Array2<f32>,
        y: &[usize],
        n_classes: usize,
        params: &BoostingParams,
    ) -> Result<Self> {
        check_training_set(x, y, n_classes)?;
        let n = x.nrows();
        let indices: Vec<usize> = (0..n).collect();
        let builder = GradientTreeBuilder {
            max_depth: params.max_depth,
            lambda: params.lambda,
            min_child_weight: params.min_child_weight,
            learning_rate: params.learning_rate,
        };

        let mut margins = Array2::<f32>::from_elem((n, n_classes), BASE_SCORE);
        let mut grad = vec![0.0f32; n];
        let mut hess = vec![0.0f32; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            let proba: Vec<Vec<f32>> = margins
                .outer_iter()
                .map(|m| softmax(&m.to_vec()))
                .collect();

            let mut round_trees = Vec::with_capacity(n_classes);
            for class in 0..n_classes {
                for i in 0..n {
                    let p = proba[i][class];
                    let target = if y[i] == class { 1.0 } else { 0.0 };
                    grad[i] = p - target;
                    hess[i] = (2.0 * p * (1.0 - p)).max(MIN_HESSIAN);
                }
                let tree = builder.fit(x, &grad, &hess, &indices);
                for i in 0..n {
                    margins[[i, class]] += tree.leaf_value(x.row(i))[0];
                }
                round_trees.push(tree);
            }
            trees.push(round_trees);

            if (round + 1) % 25 == 0 {
                debug!("Gradient boosting: {} rounds fitted", round + 1);
            }
        }

        Ok(Self {
            trees,
            base_score: BASE_SCORE,
            n_classes,
            n_features: x.ncols(),
        })
    }

    /// Raw per-class margins before the softmax.
    pub fn margins(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        let mut margins = vec![self.base_score; self.n_classes];
        for round in &self.trees {
            for (m, tree) in margins.iter_mut().zip(round) {
                *m += tree.leaf_value(row)[0];
            }
        }
        margins
    }
}

impl Classifier for GradientBoosting {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        softmax(&self.margins(row))
    }
}
