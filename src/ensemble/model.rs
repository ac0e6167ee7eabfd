//! The three trained ensembles behind one type, with native persistence.

use crate::defaults;
use crate::ensemble::{AdaBoost, Classifier, GradientBoosting, RandomForest};
use crate::error::Result;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    AdaBoost,
    GradientBoosting,
}

impl ModelKind {
    /// Training and export order.
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::AdaBoost,
        ModelKind::GradientBoosting,
    ];

    /// Artifact stem shared by the native and portable files.
    pub fn artifact_stem(self) -> &'static str {
        match self {
            ModelKind::RandomForest => "rf_model",
            ModelKind::AdaBoost => "adaboost_model",
            ModelKind::GradientBoosting => "gbt_model",
        }
    }

    pub fn native_file(self) -> String {
        format!("{}{}", self.artifact_stem(), defaults::NATIVE_SUFFIX)
    }

    pub fn portable_file(self) -> String {
        format!("{}{}", self.artifact_stem(), defaults::PORTABLE_SUFFIX)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::RandomForest => write!(f, "Random Forest"),
            ModelKind::AdaBoost => write!(f, "AdaBoost"),
            ModelKind::GradientBoosting => write!(f, "Gradient Boosting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassicalModel {
    RandomForest(RandomForest),
    AdaBoost(AdaBoost),
    GradientBoosting(GradientBoosting),
}

impl ClassicalModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            ClassicalModel::RandomForest(_) => ModelKind::RandomForest,
            ClassicalModel::AdaBoost(_) => ModelKind::AdaBoost,
            ClassicalModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    /// Width of the feature rows the model was trained on.
    pub fn n_features(&self) -> usize {
        match self {
            ClassicalModel::RandomForest(m) => m.n_features,
            ClassicalModel::AdaBoost(m) => m.n_features,
            ClassicalModel::GradientBoosting(m) => m.n_features,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassicalModel::RandomForest(m) => m,
            ClassicalModel::AdaBoost(m) => m,
            ClassicalModel::GradientBoosting(m) => m,
        }
    }

    /// Write the model as bincode.
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

impl Classifier for ClassicalModel {
    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn predict_proba(&self, row: ArrayView1<'_, f32>) -> Vec<f32> {
        self.inner().predict_proba(row)
    }

    fn predict_one(&self, row: ArrayView1<'_, f32>) -> usize {
        self.inner().predict_one(row)
    }
}
