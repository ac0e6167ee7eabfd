//! Summary features and the three tree ensembles.

use crate::config::Config;
use crate::defaults;
use crate::ensemble::{
    AdaBoost, BoostingParams, ClassicalModel, Classifier, ClassificationReport, GradientBoosting,
    ModelKind, RandomForest,
};
use crate::error::{ActimateError, Result};
use crate::export::PortableTreeEnsemble;
use crate::features::{FeatureScaler, reduce_windows};
use crate::pipeline::{ExportOutcome, PreparedData, log_export};
use crate::split::take;
use ndarray::{Array2, Axis};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Test-set evaluation of one trained ensemble.
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub kind: ModelKind,
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub native_path: PathBuf,
}

#[derive(Debug)]
pub struct ClassicalRun {
    pub scaler: FeatureScaler,
    pub models: Vec<ClassicalModel>,
    pub results: Vec<ModelResult>,
    pub exports: Vec<ExportOutcome>,
}

fn select_rows(x: &Array2<f32>, rows: &[usize]) -> Array2<f32> {
    x.select(Axis(0), rows)
}

fn fit_model(kind: ModelKind, x: &Array2<f32>, y: &[usize], config: &Config) -> Result<ClassicalModel> {
    let n_classes = config.dataset.activities.len();
    let classical = &config.classical;
    let seed = config.split.seed;
    Ok(match kind {
        ModelKind::RandomForest => ClassicalModel::RandomForest(RandomForest::fit(
            x,
            y,
            n_classes,
            classical.n_estimators,
            seed,
        )?),
        ModelKind::AdaBoost => ClassicalModel::AdaBoost(AdaBoost::fit(
            x,
            y,
            n_classes,
            classical.n_estimators,
            classical.adaboost_learning_rate,
            seed,
        )?),
        ModelKind::GradientBoosting => {
            let params = BoostingParams {
                n_estimators: classical.n_estimators,
                learning_rate: classical.gbt_learning_rate,
                max_depth: classical.gbt_max_depth,
                ..BoostingParams::default()
            };
            ClassicalModel::GradientBoosting(GradientBoosting::fit(x, y, n_classes, &params)?)
        }
    })
}

/// Reduce every window to its summary vector, scale, and fit the ensembles.
///
/// The scaler is fitted on the training rows only. Each model is evaluated
/// on the test rows, saved natively and exported; an export failure is
/// recorded and the next model still runs.
pub fn train_classical(config: &Config, data: &PreparedData) -> Result<ClassicalRun> {
    let features = reduce_windows(&data.windows)?;
    info!(
        "Feature matrix: {} windows × {} features",
        features.nrows(),
        features.ncols()
    );

    let train_raw = select_rows(&features, &data.split.train);
    let test_raw = select_rows(&features, &data.split.test);
    let train_y = take(&data.labels, &data.split.train);
    let test_y = take(&data.labels, &data.split.test);

    let scaler = FeatureScaler::fit(&train_raw)?;
    fs::create_dir_all(&config.output.dir)?;
    scaler.save(&config.output.artifact(defaults::FEATURE_SCALER_FILE))?;
    let train_x = scaler.transform(&train_raw)?;
    let test_x = scaler.transform(&test_raw)?;

    let classes = &config.dataset.activities;
    let mut models = Vec::new();
    let mut results = Vec::new();
    let mut exports = Vec::new();

    for kind in ModelKind::ALL {
        info!("Training {}...", kind);
        let model = fit_model(kind, &train_x, &train_y, config)?;

        let predicted = model.predict(&test_x);
        let report = ClassificationReport::new(&predicted, &test_y, classes);
        info!("{} accuracy: {:.4}", kind, report.accuracy);

        let native_path = config.output.artifact(&kind.native_file());
        model.save(&native_path)?;

        let outcome = export_one(config, &model, &scaler);
        log_export(&outcome);
        exports.push(outcome);

        results.push(ModelResult {
            kind,
            accuracy: report.accuracy,
            report,
            native_path,
        });
        models.push(model);
    }

    Ok(ClassicalRun {
        scaler,
        models,
        results,
        exports,
    })
}

fn export_one(config: &Config, model: &ClassicalModel, scaler: &FeatureScaler) -> ExportOutcome {
    let kind = model.kind();
    let result = PortableTreeEnsemble::from_model(model, scaler, &config.dataset.activities)
        .and_then(|doc| {
            let path = config.output.artifact(&doc.file_name());
            doc.save(&path)?;
            Ok(path)
        });
    ExportOutcome {
        model: kind.artifact_stem().to_string(),
        result,
    }
}

/// Re-export the native ensembles found in the output directory.
///
/// A model whose native file is missing or unreadable is reported like any
/// other export failure.
pub fn export_classical(config: &Config) -> Result<Vec<ExportOutcome>> {
    let scaler_path = config.output.artifact(defaults::FEATURE_SCALER_FILE);
    if !scaler_path.exists() {
        return Err(ActimateError::InsufficientData {
            message: format!(
                "{} not found; run train-classical first",
                scaler_path.display()
            ),
        });
    }
    let scaler = FeatureScaler::load(&scaler_path)?;

    let outcomes = ModelKind::ALL
        .iter()
        .map(|&kind| {
            let native = config.output.artifact(&kind.native_file());
            let outcome = match ClassicalModel::load(&native) {
                Ok(model) => export_one(config, &model, &scaler),
                Err(e) => ExportOutcome {
                    model: kind.artifact_stem().to_string(),
                    result: Err(e),
                },
            };
            log_export(&outcome);
            outcome
        })
        .collect();
    Ok(outcomes)
}
