//! End-to-end runs: load, window, split, train, persist and export.
//!
//! Every stage takes the [`Config`] explicitly; artifacts land in
//! `config.output.dir` under fixed names.

pub mod classical;
#[cfg(feature = "sequence")]
pub mod sequence;

pub use classical::{ClassicalRun, ModelResult, export_classical, train_classical};
#[cfg(feature = "sequence")]
pub use sequence::{SequenceRun, export_sequence, train_sequence};

use crate::config::Config;
use crate::dataset::{DatasetLoader, LoadManifest, LoadedDataset, Window, build_windows};
use crate::defaults;
use crate::error::{ActimateError, Result};
use crate::split::{Split, stratified_split};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Windows of the whole dataset and the stratified split over them.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub windows: Vec<Window>,
    pub labels: Vec<usize>,
    pub split: Split,
    pub manifest: LoadManifest,
}

/// Result of one export attempt.
#[derive(Debug)]
pub struct ExportOutcome {
    pub model: String,
    pub result: Result<PathBuf>,
}

impl ExportOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Load the dataset, write the manifest and report what was found.
pub fn scan(config: &Config) -> Result<LoadedDataset> {
    let dataset = DatasetLoader::new(&config.dataset).load()?;
    fs::create_dir_all(&config.output.dir)?;
    dataset
        .manifest
        .save(&config.output.artifact(defaults::LOAD_MANIFEST_FILE))?;

    let per_label = dataset
        .manifest
        .windows_per_label(config.dataset.activities.len());
    for (activity, count) in config.dataset.activities.iter().zip(&per_label) {
        info!("  {}: {} windows", activity, count);
    }
    if !dataset.manifest.skipped.is_empty() {
        warn!("{} samples skipped", dataset.manifest.skipped.len());
    }
    Ok(dataset)
}

/// Scan, window and split the dataset.
pub fn prepare(config: &Config) -> Result<PreparedData> {
    let dataset = scan(config)?;
    let windows = build_windows(&dataset.samples, config.dataset.window_len);
    if windows.is_empty() {
        return Err(ActimateError::InsufficientData {
            message: format!(
                "no windows of {} rows in {}",
                config.dataset.window_len,
                config.dataset.root.display()
            ),
        });
    }
    info!(
        "Total windows: {} of shape ({}, {})",
        windows.len(),
        config.dataset.window_len,
        defaults::NUM_CHANNELS
    );

    let labels: Vec<usize> = windows.iter().map(|w| w.label).collect();
    let split = stratified_split(&labels, config.split.train_fraction, config.split.seed)?;
    info!(
        "Split: {} training, {} test windows",
        split.train.len(),
        split.test.len()
    );

    Ok(PreparedData {
        windows,
        labels,
        split,
        manifest: dataset.manifest,
    })
}

/// Collect export failures into log lines without aborting the run.
pub(crate) fn log_export(outcome: &ExportOutcome) {
    match &outcome.result {
        Ok(path) => info!("Exported {} to {}", outcome.model, path.display()),
        Err(e) => warn!("Export of {} failed: {}", outcome.model, e),
    }
}
