//! Portable document for the tree ensembles.
//!
//! Trees are flattened into the tree-ensemble-classifier attribute layout:
//! parallel `nodes_*` arrays describe every node of every tree and the
//! `class_*` arrays attach per-class weights to leaves. A row is scored by
//! summing the leaf weights it reaches on top of `base_values`, then
//! applying `post_transform`.

use crate::defaults;
use crate::ensemble::tree::Node;
use crate::ensemble::{ClassicalModel, Tree, argmax, softmax};
use crate::error::{ActimateError, Result};
use crate::export::{FORMAT_VERSION, TensorSpec, producer};
use crate::features::FeatureScaler;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const INPUT_NAME: &str = "float_input";
pub const MODE_BRANCH: &str = "BRANCH_LEQ";
pub const MODE_LEAF: &str = "LEAF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostTransform {
    None,
    Softmax,
}

/// `y = (x - offset) * scale`, applied before the trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerStage {
    pub offset: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleAttributes {
    pub nodes_treeids: Vec<usize>,
    pub nodes_nodeids: Vec<usize>,
    pub nodes_featureids: Vec<usize>,
    pub nodes_values: Vec<f64>,
    pub nodes_modes: Vec<String>,
    pub nodes_truenodeids: Vec<usize>,
    pub nodes_falsenodeids: Vec<usize>,
    pub class_treeids: Vec<usize>,
    pub class_nodeids: Vec<usize>,
    pub class_ids: Vec<usize>,
    pub class_weights: Vec<f64>,
    pub classlabels_int64s: Vec<i64>,
    pub base_values: Vec<f64>,
    pub post_transform: Option<PostTransform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableTreeEnsemble {
    pub format: String,
    pub producer: String,
    pub model: String,
    pub input: TensorSpec,
    pub classes: Vec<String>,
    pub scaler: ScalerStage,
    pub classifier: TreeEnsembleAttributes,
}

fn unsupported(model: &str, message: impl Into<String>) -> ActimateError {
    ActimateError::UnsupportedModelStructure {
        model: model.to_string(),
        message: message.into(),
    }
}

/// How one tree's leaves turn into class weights.
enum LeafWeights {
    /// Every class gets `value[k] / divisor`.
    Distribution { divisor: f32 },
    /// The majority class gets `weight`.
    Vote { weight: f32 },
    /// The single leaf score goes to `class`.
    Score { class: usize },
}

impl TreeEnsembleAttributes {
    fn push_tree(
        &mut self,
        model: &str,
        tree_id: usize,
        tree: &Tree,
        leaves: &LeafWeights,
        n_classes: usize,
        n_features: usize,
    ) -> Result<()> {
        if tree.nodes.is_empty() {
            return Err(unsupported(model, format!("tree {} has no nodes", tree_id)));
        }
        for (node_id, node) in tree.nodes.iter().enumerate() {
            self.nodes_treeids.push(tree_id);
            self.nodes_nodeids.push(node_id);
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(unsupported(
                            model,
                            format!(
                                "tree {} splits on feature {} but the input has {} features",
                                tree_id, feature, n_features
                            ),
                        ));
                    }
                    if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                        return Err(unsupported(
                            model,
                            format!("tree {} node {} points outside the tree", tree_id, node_id),
                        ));
                    }
                    self.nodes_featureids.push(*feature);
                    self.nodes_values.push(f64::from(*threshold));
                    self.nodes_modes.push(MODE_BRANCH.to_string());
                    self.nodes_truenodeids.push(*left);
                    self.nodes_falsenodeids.push(*right);
                }
                Node::Leaf { value } => {
                    self.nodes_featureids.push(0);
                    self.nodes_values.push(0.0);
                    self.nodes_modes.push(MODE_LEAF.to_string());
                    self.nodes_truenodeids.push(0);
                    self.nodes_falsenodeids.push(0);
                    self.push_leaf(model, tree_id, node_id, value, leaves, n_classes)?;
                }
            }
        }
        Ok(())
    }

    fn push_leaf(
        &mut self,
        model: &str,
        tree_id: usize,
        node_id: usize,
        value: &[f32],
        leaves: &LeafWeights,
        n_classes: usize,
    ) -> Result<()> {
        let expected = match leaves {
            LeafWeights::Distribution { .. } | LeafWeights::Vote { .. } => n_classes,
            LeafWeights::Score { .. } => 1,
        };
        if value.len() != expected {
            return Err(unsupported(
                model,
                format!(
                    "tree {} leaf {} has {} values, expected {}",
                    tree_id,
                    node_id,
                    value.len(),
                    expected
                ),
            ));
        }

        let mut push = |class: usize, weight: f32| {
            self.class_treeids.push(tree_id);
            self.class_nodeids.push(node_id);
            self.class_ids.push(class);
            self.class_weights.push(f64::from(weight));
        };
        match *leaves {
            LeafWeights::Distribution { divisor } => {
                for (class, v) in value.iter().enumerate() {
                    push(class, v / divisor);
                }
            }
            LeafWeights::Vote { weight } => push(argmax(value), weight),
            LeafWeights::Score { class } => push(class, value[0]),
        }
        Ok(())
    }
}

impl PortableTreeEnsemble {
    /// Flatten a trained ensemble and its scaler into a portable document.
    pub fn from_model(
        model: &ClassicalModel,
        scaler: &FeatureScaler,
        classes: &[String],
    ) -> Result<Self> {
        let kind = model.kind();
        let name = kind.artifact_stem();
        let n_features = scaler.width();
        if model.n_features() != n_features {
            return Err(unsupported(
                name,
                format!(
                    "model expects {} features but the scaler produces {}",
                    model.n_features(),
                    n_features
                ),
            ));
        }

        let n_classes = classes.len();
        let mut attrs = TreeEnsembleAttributes {
            classlabels_int64s: (0..n_classes as i64).collect(),
            ..Default::default()
        };

        match model {
            ClassicalModel::RandomForest(forest) => {
                check_classes(name, forest.n_classes, n_classes)?;
                if forest.trees.is_empty() {
                    return Err(unsupported(name, "ensemble has no trees"));
                }
                let divisor = forest.trees.len() as f32;
                for (id, tree) in forest.trees.iter().enumerate() {
                    let leaves = LeafWeights::Distribution { divisor };
                    attrs.push_tree(name, id, tree, &leaves, n_classes, n_features)?;
                }
                attrs.base_values = vec![0.0; n_classes];
                attrs.post_transform = Some(PostTransform::None);
            }
            ClassicalModel::AdaBoost(boost) => {
                check_classes(name, boost.n_classes, n_classes)?;
                if boost.stumps.is_empty() {
                    return Err(unsupported(name, "ensemble has no trees"));
                }
                for (id, (stump, weight)) in
                    boost.stumps.iter().zip(boost.vote_weights()).enumerate()
                {
                    let leaves = LeafWeights::Vote { weight };
                    attrs.push_tree(name, id, stump, &leaves, n_classes, n_features)?;
                }
                attrs.base_values = vec![0.0; n_classes];
                attrs.post_transform = Some(PostTransform::Softmax);
            }
            ClassicalModel::GradientBoosting(gbt) => {
                check_classes(name, gbt.n_classes, n_classes)?;
                if gbt.trees.is_empty() {
                    return Err(unsupported(name, "ensemble has no trees"));
                }
                let mut id = 0;
                for (round, trees) in gbt.trees.iter().enumerate() {
                    if trees.len() != n_classes {
                        return Err(unsupported(
                            name,
                            format!(
                                "round {} has {} trees, expected one per class",
                                round,
                                trees.len()
                            ),
                        ));
                    }
                    for (class, tree) in trees.iter().enumerate() {
                        let leaves = LeafWeights::Score { class };
                        attrs.push_tree(name, id, tree, &leaves, n_classes, n_features)?;
                        id += 1;
                    }
                }
                attrs.base_values = vec![f64::from(gbt.base_score); n_classes];
                attrs.post_transform = Some(PostTransform::Softmax);
            }
        }

        let (offset, scale) = scaler.offset_scale();
        Ok(Self {
            format: format!("actimate.tree_ensemble/{}", FORMAT_VERSION),
            producer: producer(),
            model: name.to_string(),
            input: TensorSpec::new(INPUT_NAME, vec![None, Some(n_features)]),
            classes: classes.to_vec(),
            scaler: ScalerStage {
                offset: offset.into_iter().map(f64::from).collect(),
                scale: scale.into_iter().map(f64::from).collect(),
            },
            classifier: attrs,
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.model, defaults::PORTABLE_SUFFIX)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Index the flat attribute arrays into per-tree node tables.
    pub fn compile(&self) -> Result<CompiledEnsemble> {
        let a = &self.classifier;
        let n = a.nodes_nodeids.len();
        let parallel = [
            a.nodes_treeids.len(),
            a.nodes_featureids.len(),
            a.nodes_values.len(),
            a.nodes_modes.len(),
            a.nodes_truenodeids.len(),
            a.nodes_falsenodeids.len(),
        ];
        if parallel.iter().any(|&len| len != n) {
            return Err(unsupported(&self.model, "nodes_* arrays differ in length"));
        }
        let class_len = a.class_nodeids.len();
        if a.class_treeids.len() != class_len
            || a.class_ids.len() != class_len
            || a.class_weights.len() != class_len
        {
            return Err(unsupported(&self.model, "class_* arrays differ in length"));
        }
        let n_classes = self.classes.len();
        if a.base_values.len() != n_classes {
            return Err(unsupported(
                &self.model,
                format!("{} base values for {} classes", a.base_values.len(), n_classes),
            ));
        }
        let width = self.scaler.offset.len();
        if self.scaler.scale.len() != width || self.input.shape.last() != Some(&Some(width)) {
            return Err(unsupported(&self.model, "scaler width differs from the input"));
        }

        let mut trees: Vec<Vec<CompiledNode>> = Vec::new();
        let mut position: HashMap<(usize, usize), usize> = HashMap::new();
        for i in 0..n {
            let (tree, node) = (a.nodes_treeids[i], a.nodes_nodeids[i]);
            if tree >= trees.len() {
                trees.resize_with(tree + 1, Vec::new);
            }
            position.insert((tree, node), trees[tree].len());
            let kind = match a.nodes_modes[i].as_str() {
                MODE_BRANCH => {
                    if a.nodes_featureids[i] >= width {
                        return Err(unsupported(
                            &self.model,
                            format!("feature {} outside the input width", a.nodes_featureids[i]),
                        ));
                    }
                    NodeKind::Branch {
                        feature: a.nodes_featureids[i],
                        threshold: a.nodes_values[i] as f32,
                        true_id: a.nodes_truenodeids[i],
                        false_id: a.nodes_falsenodeids[i],
                    }
                }
                MODE_LEAF => NodeKind::Leaf,
                other => {
                    return Err(unsupported(&self.model, format!("node mode {}", other)));
                }
            };
            trees[tree].push(CompiledNode {
                kind,
                weights: Vec::new(),
            });
        }
        if trees.is_empty() || trees.iter().any(Vec::is_empty) {
            return Err(unsupported(&self.model, "ensemble has empty trees"));
        }

        // resolve child ids to positions
        for (tree_id, nodes) in trees.iter_mut().enumerate() {
            for node in nodes.iter_mut() {
                if let NodeKind::Branch {
                    true_id, false_id, ..
                } = &mut node.kind
                {
                    let lookup = |id: usize| {
                        position.get(&(tree_id, id)).copied().ok_or_else(|| {
                            unsupported(
                                &self.model,
                                format!("tree {} references missing node {}", tree_id, id),
                            )
                        })
                    };
                    *true_id = lookup(*true_id)?;
                    *false_id = lookup(*false_id)?;
                }
            }
        }

        for i in 0..class_len {
            let key = (a.class_treeids[i], a.class_nodeids[i]);
            let &pos = position.get(&key).ok_or_else(|| {
                unsupported(
                    &self.model,
                    format!("class weight for missing node {:?}", key),
                )
            })?;
            if a.class_ids[i] >= n_classes {
                return Err(unsupported(
                    &self.model,
                    format!("class id {} outside {} classes", a.class_ids[i], n_classes),
                ));
            }
            trees[key.0][pos]
                .weights
                .push((a.class_ids[i], a.class_weights[i] as f32));
        }

        // the root is node id 0 of each tree
        let roots = (0..trees.len())
            .map(|t| {
                position.get(&(t, 0)).copied().ok_or_else(|| {
                    unsupported(&self.model, format!("tree {} has no root node", t))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        for (tree_id, (nodes, &root)) in trees.iter().zip(&roots).enumerate() {
            check_tree_shape(&self.model, tree_id, nodes, root)?;
        }

        Ok(CompiledEnsemble {
            trees,
            roots,
            offset: self.scaler.offset.iter().map(|&v| v as f32).collect(),
            scale: self.scaler.scale.iter().map(|&v| v as f32).collect(),
            base_values: a.base_values.iter().map(|&v| v as f32).collect(),
            post_transform: a.post_transform.unwrap_or(PostTransform::None),
        })
    }
}

/// Every node must be reached from the root exactly once, so evaluation
/// always ends at a leaf.
fn check_tree_shape(model: &str, tree_id: usize, nodes: &[CompiledNode], root: usize) -> Result<()> {
    let mut seen = vec![false; nodes.len()];
    let mut stack = vec![root];
    while let Some(pos) = stack.pop() {
        if std::mem::replace(&mut seen[pos], true) {
            return Err(unsupported(
                model,
                format!("tree {} reaches a node twice (cycle or shared child)", tree_id),
            ));
        }
        if let NodeKind::Branch {
            true_id, false_id, ..
        } = nodes[pos].kind
        {
            stack.push(true_id);
            stack.push(false_id);
        }
    }
    Ok(())
}

fn check_classes(model: &str, trained: usize, declared: usize) -> Result<()> {
    if trained != declared {
        return Err(unsupported(
            model,
            format!("trained on {} classes, {} labels declared", trained, declared),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum NodeKind {
    Branch {
        feature: usize,
        threshold: f32,
        true_id: usize,
        false_id: usize,
    },
    Leaf,
}

#[derive(Debug, Clone)]
struct CompiledNode {
    kind: NodeKind,
    weights: Vec<(usize, f32)>,
}

/// A portable document ready to score raw feature rows.
#[derive(Debug, Clone)]
pub struct CompiledEnsemble {
    trees: Vec<Vec<CompiledNode>>,
    roots: Vec<usize>,
    offset: Vec<f32>,
    scale: Vec<f32>,
    base_values: Vec<f32>,
    post_transform: PostTransform,
}

impl CompiledEnsemble {
    pub fn width(&self) -> usize {
        self.offset.len()
    }

    /// Class scores for one unscaled feature row of `width()` values.
    fn predict_proba_row(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        let scaled: Vec<f32> = row
            .iter()
            .zip(self.offset.iter().zip(&self.scale))
            .map(|(&x, (&o, &s))| (x - o) * s)
            .collect();
        let mut scores = self.base_values.clone();
        for (nodes, &root) in self.trees.iter().zip(&self.roots) {
            let mut pos = root;
            loop {
                let node = &nodes[pos];
                match node.kind {
                    NodeKind::Branch {
                        feature,
                        threshold,
                        true_id,
                        false_id,
                    } => {
                        pos = if scaled[feature] <= threshold { true_id } else { false_id };
                    }
                    NodeKind::Leaf => {
                        for &(class, weight) in &node.weights {
                            scores[class] += weight;
                        }
                        break;
                    }
                }
            }
        }
        match self.post_transform {
            PostTransform::None => scores,
            PostTransform::Softmax => softmax(&scores),
        }
    }

    pub fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.width() {
            return Err(ActimateError::ShapeMismatch {
                expected: format!("{} features", self.width()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let n_classes = self.base_values.len();
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.outer_iter().enumerate() {
            for (c, p) in self.predict_proba_row(row).into_iter().enumerate() {
                out[[i, c]] = p;
            }
        }
        Ok(out)
    }

    pub fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| argmax(&row.to_vec()))
            .collect())
    }
}
