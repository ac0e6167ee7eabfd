//! Binary decision trees shared by the three ensembles.
//!
//! Nodes live in a flat arena with the root at index 0. A row goes left when
//! `row[feature] <= threshold`.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// Class probabilities for classification trees, a single score for
    /// gradient trees.
    Leaf { value: Vec<f32> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `row`.
    pub fn leaf_value(&self, row: ArrayView1<'_, f32>) -> &[f32] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return value,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Highest feature index any split reads.
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

/// Midpoint threshold that still separates `lo` from `hi`.
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi { lo } else { mid }
}

/// Node indices sorted by one feature.
fn sorted_by_feature(x: &Array2<f32>, indices: &[usize], feature: usize) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
    sorted
}

/// CART classification tree with weighted Gini impurity.
#[derive(Debug, Clone)]
pub struct ClassificationTreeBuilder {
    pub n_classes: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Candidate features drawn per node; `None` searches all of them.
    pub max_features: Option<usize>,
}

struct ClassSplit {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

impl ClassificationTreeBuilder {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
        }
    }

    /// Grow a tree over the rows in `indices` (duplicates allowed).
    pub fn fit(
        &self,
        x: &Array2<f32>,
        y: &[usize],
        weights: &[f32],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Tree {
        let mut nodes = Vec::new();
        self.grow(x, y, weights, indices.to_vec(), 0, rng, &mut nodes);
        Tree { nodes }
    }

    fn class_weights(&self, y: &[usize], weights: &[f32], indices: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_classes];
        for &i in indices {
            totals[y[i]] += f64::from(weights[i]);
        }
        totals
    }

    #[allow(clippy::too_many_arguments)]
    fn grow(
        &self,
        x: &Array2<f32>,
        y: &[usize],
        weights: &[f32],
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let totals = self.class_weights(y, weights, &indices);
        let total: f64 = totals.iter().sum();
        let pure = totals.iter().filter(|&&w| w > 0.0).count() <= 1;
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);

        let split = if pure || depth_reached || indices.len() < self.min_samples_split || total <= 0.0
        {
            None
        } else {
            self.best_split(x, y, weights, &indices, &totals, rng)
        };

        let Some(split) = split else {
            let value = totals
                .iter()
                .map(|&w| if total > 0.0 { (w / total) as f32 } else { 0.0 })
                .collect();
            nodes.push(Node::Leaf { value });
            return nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);

        let id = nodes.len();
        nodes.push(Node::Leaf { value: Vec::new() });
        let left = self.grow(x, y, weights, left_idx, depth + 1, rng, nodes);
        let right = self.grow(x, y, weights, right_idx, depth + 1, rng, nodes);
        nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => {
                let mut picked = sample(rng, n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(
        &self,
        x: &Array2<f32>,
        y: &[usize],
        weights: &[f32],
        indices: &[usize],
        totals: &[f64],
        rng: &mut StdRng,
    ) -> Option<ClassSplit> {
        let total: f64 = totals.iter().sum();
        let parent = gini_weighted(totals, total);
        let mut best: Option<ClassSplit> = None;

        for feature in self.candidate_features(x.ncols(), rng) {
            let sorted = sorted_by_feature(x, indices, feature);
            let mut left = vec![0.0f64; self.n_classes];
            let mut left_total = 0.0f64;

            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                let w = f64::from(weights[i]);
                left[y[i]] += w;
                left_total += w;

                let here = x[[i, feature]];
                let next = x[[sorted[pos + 1], feature]];
                if here >= next {
                    continue;
                }
                let right_total = total - left_total;
                if left_total <= 0.0 || right_total <= 0.0 {
                    continue;
                }
                let right: Vec<f64> = totals.iter().zip(&left).map(|(t, l)| t - l).collect();
                let impurity =
                    gini_weighted(&left, left_total) + gini_weighted(&right, right_total);
                if impurity < parent - 1e-12
                    && best.as_ref().is_none_or(|b| impurity < b.impurity)
                {
                    best = Some(ClassSplit {
                        feature,
                        threshold: midpoint(here, next),
                        impurity,
                    });
                }
            }
        }
        best
    }
}

/// `total × gini` for a weighted class histogram.
fn gini_weighted(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
    total - sum_sq / total
}

/// Second-order regression tree for gradient boosting.
#[derive(Debug, Clone)]
pub struct GradientTreeBuilder {
    pub max_depth: usize,
    pub lambda: f32,
    pub min_child_weight: f32,
    /// Factor applied to every leaf weight.
    pub learning_rate: f32,
}

struct GradientSplit {
    feature: usize,
    threshold: f32,
    gain: f64,
}

impl GradientTreeBuilder {
    pub fn fit(&self, x: &Array2<f32>, grad: &[f32], hess: &[f32], indices: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.grow(x, grad, hess, indices.to_vec(), 0, &mut nodes);
        Tree { nodes }
    }

    fn grow(
        &self,
        x: &Array2<f32>,
        grad: &[f32],
        hess: &[f32],
        indices: Vec<usize>,
        depth: usize,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let g: f64 = indices.iter().map(|&i| f64::from(grad[i])).sum();
        let h: f64 = indices.iter().map(|&i| f64::from(hess[i])).sum();
        let lambda = f64::from(self.lambda);

        let split = if depth >= self.max_depth || indices.len() < 2 {
            None
        } else {
            self.best_split(x, grad, hess, &indices, g, h)
        };

        let Some(split) = split else {
            let weight = -g / (h + lambda) * f64::from(self.learning_rate);
            nodes.push(Node::Leaf {
                value: vec![weight as f32],
            });
            return nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);

        let id = nodes.len();
        nodes.push(Node::Leaf { value: Vec::new() });
        let left = self.grow(x, grad, hess, left_idx, depth + 1, nodes);
        let right = self.grow(x, grad, hess, right_idx, depth + 1, nodes);
        nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(
        &self,
        x: &Array2<f32>,
        grad: &[f32],
        hess: &[f32],
        indices: &[usize],
        g: f64,
        h: f64,
    ) -> Option<GradientSplit> {
        let lambda = f64::from(self.lambda);
        let min_child = f64::from(self.min_child_weight);
        let parent_score = g * g / (h + lambda);
        let mut best: Option<GradientSplit> = None;

        for feature in 0..x.ncols() {
            let sorted = sorted_by_feature(x, indices, feature);
            let mut gl = 0.0f64;
            let mut hl = 0.0f64;

            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                gl += f64::from(grad[i]);
                hl += f64::from(hess[i]);

                let here = x[[i, feature]];
                let next = x[[sorted[pos + 1], feature]];
                if here >= next {
                    continue;
                }
                let gr = g - gl;
                let hr = h - hl;
                if hl < min_child || hr < min_child {
                    continue;
                }
                let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(GradientSplit {
                        feature,
                        threshold: midpoint(here, next),
                        gain,
                    });
                }
            }
        }
        best
    }
}
