//! Normalized windows through the bidirectional LSTM.

use crate::config::Config;
use crate::dataset::window::stack_windows;
use crate::defaults;
use crate::error::{ActimateError, Result};
use crate::export::PortableSequenceModel;
use crate::features::NormalizationParams;
use crate::pipeline::{ExportOutcome, PreparedData, log_export};
use crate::sequence::{Architecture, SequenceModel, SequenceTrainer, TrainingOutcome};
use crate::split::take;
use ndarray::Array3;
use std::fs;
use tracing::info;

#[derive(Debug)]
pub struct SequenceRun {
    pub params: NormalizationParams,
    pub outcome: TrainingOutcome,
    pub export: ExportOutcome,
}

/// Architecture sized for the configured window and activity list.
pub fn architecture(config: &Config) -> Architecture {
    Architecture {
        window_len: config.dataset.window_len,
        n_classes: config.dataset.activities.len(),
        ..Architecture::default()
    }
}

fn stack(windows: &[crate::dataset::Window], what: &str) -> Result<Array3<f32>> {
    stack_windows(windows).ok_or_else(|| ActimateError::InsufficientData {
        message: format!("{} split has no windows", what),
    })
}

/// Normalize with training statistics, train, and export the result.
pub fn train_sequence(config: &Config, data: &PreparedData) -> Result<SequenceRun> {
    let train_windows = take(&data.windows, &data.split.train);
    let test_windows = take(&data.windows, &data.split.test);

    let params = NormalizationParams::fit(&train_windows)?;
    fs::create_dir_all(&config.output.dir)?;
    params.save(&config.output.artifact(defaults::NORMALIZATION_PARAMS_FILE))?;

    let train = stack(&params.apply(&train_windows)?, "training")?;
    let test = stack(&params.apply(&test_windows)?, "test")?;
    let train_labels = take(&data.labels, &data.split.train);
    let test_labels = take(&data.labels, &data.split.test);
    info!(
        "Sequence tensors: train {:?}, test {:?}",
        train.shape(),
        test.shape()
    );

    let trainer = SequenceTrainer::new(
        &config.sequence,
        &config.output,
        architecture(config),
        config.split.seed,
    );
    let (model, outcome) = trainer.fit(&train, &train_labels, &test, &test_labels)?;
    info!(
        "Test accuracy: {:.4} (loss {:.4})",
        outcome.test_accuracy, outcome.test_loss
    );

    let export = export_model(config, &model, &params);
    log_export(&export);

    Ok(SequenceRun {
        params,
        outcome,
        export,
    })
}

fn export_model(
    config: &Config,
    model: &SequenceModel,
    params: &NormalizationParams,
) -> ExportOutcome {
    let result = PortableSequenceModel::from_model(model, params, &config.dataset.activities)
        .and_then(|doc| {
            let path = config.output.artifact(&doc.file_name());
            doc.save(&path)?;
            Ok(path)
        });
    ExportOutcome {
        model: crate::export::sequence::MODEL_NAME.to_string(),
        result,
    }
}

/// Re-export a previously trained network from the output directory.
pub fn export_sequence(config: &Config) -> Result<ExportOutcome> {
    let weights = config.output.artifact(defaults::SEQUENCE_MODEL_FILE);
    let params_path = config.output.artifact(defaults::NORMALIZATION_PARAMS_FILE);
    for path in [&weights, &params_path] {
        if !path.exists() {
            return Err(ActimateError::InsufficientData {
                message: format!("{} not found; run train-sequence first", path.display()),
            });
        }
    }
    let params = NormalizationParams::load(&params_path)?;
    let model = SequenceModel::load(architecture(config), &weights)?;
    let outcome = export_model(config, &model, &params);
    log_export(&outcome);
    Ok(outcome)
}
