//! Random forest: bootstrapped Gini trees with per-node feature sampling.

use crate::ensemble::Classifier;
use crate::ensemble::tree::{ClassificationTreeBuilder, Tree};
use crate::error::{ActimateError, Result};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<Tree>,
    pub n_classes: usize,
    pub n_features: usize,
}

impl RandomForest {
    /// Fit `n_estimators` fully grown trees.
    ///
    /// Each tree sees a bootstrap sample of the rows and draws
    /// `sqrt(n_features)` candidate features at every node.
    pub fn fit(
        x: &Array2<f32>,
        y: &[usize],
        n_classes: usize,
        n_estimators: usize,
        seed: u64,
    ) -> Result<Self> {
        check_training_set(x, y, n_classes)?;
        let n = x.nrows();
        let n_features = x.ncols();
        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        let builder = ClassificationTreeBuilder {
            max_features: Some(max_features),
            ..ClassificationTreeBuilder::new(n_classes)
        };
        let weights = vec![1.0f32; n];
        let mut rng = StdRng::seed_from_u64(seed);

        let trees: Vec<Tree> = (0..n_estimators)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                builder.fit(x, y, &weights, &bootstrap, &mut rng)
            })
            .collect();

        debug!(
            "Random forest: {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(Tree::depth).sum::<usize>() as f64 / trees.len().max(1) as f64
        );

        Ok(Self {
            trees,
            n_classes,
            n_features,
        })
    }
}

impl Classifier for RandomForest {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Mean of the per-tree leaf class distributions.
    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        let n = self.trees.len().max(1) as f32;
        let mut proba = vec![0.0f32; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf_value(row)) {
                *p += v / n;
            }
        }
        proba
    }
}

/// Shape and label checks shared by the ensemble trainers.
pub(crate) fn check_training_set(x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()> {
    if x.nrows() == 0 {
        return Err(ActimateError::InsufficientData {
            message: "no training rows".to_string(),
        });
    }
    if x.nrows() != y.len() {
        return Err(ActimateError::ShapeMismatch {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if let Some(&bad) = y.iter().find(|&&label| label >= n_classes) {
        return Err(ActimateError::Training {
            message: format!("label {} outside {} classes", bad, n_classes),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::test_support::blobs;

    #[test]
    fn forest_learns_separable_blobs() {
        let (x, y) = blobs(40, 3, 6, 1);
        let forest = RandomForest::fit(&x, &y, 3, 25, 42).unwrap();
        assert_eq!(forest.trees.len(), 25);
        let predicted = forest.predict(&x);
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (x, y) = blobs(20, 3, 4, 2);
        let forest = RandomForest::fit(&x, &y, 3, 10, 42).unwrap();
        let proba = forest.predict_proba(x.row(5));
        assert!((proba.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = blobs(15, 2, 4, 3);
        let a = RandomForest::fit(&x, &y, 2, 5, 9).unwrap();
        let b = RandomForest::fit(&x, &y, 2, 5, 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let (x, mut y) = blobs(5, 2, 3, 4);
        y[0] = 7;
        assert!(RandomForest::fit(&x, &y, 2, 3, 1).is_err());
    }
}
