use crate::defaults;
use crate::error::{ActimateError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure, passed explicitly into every stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub split: SplitConfig,
    pub sequence: SequenceConfig,
    pub classical: ClassicalConfig,
    pub output: OutputConfig,
}

/// Where the recordings live and how they are windowed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    pub root: PathBuf,
    /// Activity directory names; the position is the class index.
    pub activities: Vec<String>,
    pub window_len: usize,
}

/// Train/test split parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub seed: u64,
}

/// Recurrent classifier training parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SequenceConfig {
    pub batch_size: usize,
    pub max_epochs: usize,
    pub learning_rate: f64,
    pub validation_fraction: f64,
    pub early_stopping_patience: usize,
    pub lr_plateau_patience: usize,
    pub lr_plateau_factor: f64,
    pub min_learning_rate: f64,
}

/// Ensemble training parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassicalConfig {
    pub n_estimators: usize,
    pub adaboost_learning_rate: f32,
    pub gbt_learning_rate: f32,
    pub gbt_max_depth: usize,
}

/// Artifact destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(defaults::DATASET_PATH),
            activities: defaults::ACTIVITIES.iter().map(|a| a.to_string()).collect(),
            window_len: defaults::WINDOW_LEN,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: defaults::TRAIN_FRACTION,
            seed: defaults::RANDOM_SEED,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            max_epochs: defaults::MAX_EPOCHS,
            learning_rate: defaults::LEARNING_RATE,
            validation_fraction: defaults::VALIDATION_FRACTION,
            early_stopping_patience: defaults::EARLY_STOPPING_PATIENCE,
            lr_plateau_patience: defaults::LR_PLATEAU_PATIENCE,
            lr_plateau_factor: defaults::LR_PLATEAU_FACTOR,
            min_learning_rate: defaults::MIN_LEARNING_RATE,
        }
    }
}

impl Default for ClassicalConfig {
    fn default() -> Self {
        Self {
            n_estimators: defaults::N_ESTIMATORS,
            adaboost_learning_rate: defaults::ADABOOST_LEARNING_RATE,
            gbt_learning_rate: defaults::GBT_LEARNING_RATE,
            gbt_max_depth: defaults::GBT_MAX_DEPTH,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

impl DatasetConfig {
    /// Step between consecutive window start offsets.
    pub fn stride(&self) -> usize {
        self.window_len / 2
    }
}

impl OutputConfig {
    /// Path of a named artifact inside the output directory.
    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ActimateError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ActimateError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `actimate.toml` in the
    /// working directory is used when present, otherwise the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(defaults::CONFIG_FILE);
                if local.is_file() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ACTIMATE_DATASET → dataset.root
    /// - ACTIMATE_OUTPUT_DIR → output.dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("ACTIMATE_DATASET")
            && !root.is_empty()
        {
            self.dataset.root = PathBuf::from(root);
        }

        if let Ok(dir) = std::env::var("ACTIMATE_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.output.dir = PathBuf::from(dir);
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> ActimateError {
            ActimateError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.dataset.window_len < 2 {
            return Err(invalid("dataset.window_len", "must be at least 2"));
        }
        if self.dataset.activities.is_empty() {
            return Err(invalid("dataset.activities", "must name at least one activity"));
        }
        let mut seen = std::collections::HashSet::new();
        for activity in &self.dataset.activities {
            if activity.trim().is_empty() {
                return Err(invalid("dataset.activities", "names must not be empty"));
            }
            if !seen.insert(activity.as_str()) {
                return Err(invalid(
                    "dataset.activities",
                    &format!("duplicate activity '{}'", activity),
                ));
            }
        }
        if !(self.split.train_fraction > 0.0 && self.split.train_fraction < 1.0) {
            return Err(invalid("split.train_fraction", "must be between 0 and 1"));
        }
        if !(self.sequence.validation_fraction > 0.0 && self.sequence.validation_fraction < 1.0)
        {
            return Err(invalid("sequence.validation_fraction", "must be between 0 and 1"));
        }
        if self.sequence.batch_size == 0 {
            return Err(invalid("sequence.batch_size", "must be positive"));
        }
        if self.sequence.max_epochs == 0 {
            return Err(invalid("sequence.max_epochs", "must be positive"));
        }
        if self.sequence.learning_rate <= 0.0 {
            return Err(invalid("sequence.learning_rate", "must be positive"));
        }
        if !(self.sequence.lr_plateau_factor > 0.0 && self.sequence.lr_plateau_factor < 1.0) {
            return Err(invalid("sequence.lr_plateau_factor", "must be between 0 and 1"));
        }
        if self.classical.n_estimators == 0 {
            return Err(invalid("classical.n_estimators", "must be positive"));
        }
        if self.classical.gbt_max_depth == 0 {
            return Err(invalid("classical.gbt_max_depth", "must be positive"));
        }
        if self.classical.adaboost_learning_rate <= 0.0 || self.classical.gbt_learning_rate <= 0.0 {
            return Err(invalid("classical", "learning rates must be positive"));
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
