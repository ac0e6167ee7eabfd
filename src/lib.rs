//! actimate - human activity recognition from smartphone inertial sensors
//!
//! Loads accelerometer, gyroscope and magnetometer recordings, cuts them into
//! overlapping windows, trains a bidirectional LSTM and three tree ensembles,
//! and exports each model as a portable document.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod defaults;
pub mod ensemble;
pub mod error;
pub mod export;
pub mod features;
pub mod git;
pub mod pipeline;
pub mod sequence;
pub mod split;

// Data
pub use dataset::{DatasetLoader, LoadManifest, Sample, SkipReason, Window, build_windows};
pub use features::{FeatureScaler, NormalizationParams, reduce_windows};
pub use split::{Split, stratified_split};

// Models
pub use ensemble::{ClassicalModel, Classifier, ModelKind};
pub use sequence::Architecture;
#[cfg(feature = "sequence")]
pub use sequence::SequenceModel;

// Export
pub use export::{PortableSequenceModel, PortableTreeEnsemble};

// Commit helper
pub use git::{CommandExecutor, CommitRequest, SystemCommandExecutor, commit_with_date};

// Error handling
pub use error::{ActimateError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
