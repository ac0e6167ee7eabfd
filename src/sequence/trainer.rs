//! Mini-batch training loop for the recurrent classifier.

use crate::config::{OutputConfig, SequenceConfig};
use crate::defaults;
use crate::error::{ActimateError, Result};
use crate::sequence::callbacks::{BestTracker, EarlyStopping, PlateauScheduler};
use crate::sequence::architecture::Architecture;
use crate::sequence::model::{SequenceModel, batch_tensor, count_correct, label_tensor};
use crate::split::validation_len;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use ndarray::{Array3, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Metrics recorded at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub history: TrainingHistory,
    /// Epoch whose weights were restored, if any epoch improved.
    pub best_epoch: Option<usize>,
    pub test_loss: f64,
    pub test_accuracy: f64,
}

pub struct SequenceTrainer<'a> {
    config: &'a SequenceConfig,
    output: &'a OutputConfig,
    arch: Architecture,
    seed: u64,
}

impl<'a> SequenceTrainer<'a> {
    pub fn new(
        config: &'a SequenceConfig,
        output: &'a OutputConfig,
        arch: Architecture,
        seed: u64,
    ) -> Self {
        Self {
            config,
            output,
            arch,
            seed,
        }
    }

    /// Train on `train`, holding back its last rows for validation, then
    /// evaluate on `test`.
    ///
    /// Writes the best-validation-accuracy checkpoint while training and the
    /// history once training ends. The returned model carries the weights of
    /// the epoch with the lowest validation loss.
    pub fn fit(
        &self,
        train: &Array3<f32>,
        train_labels: &[usize],
        test: &Array3<f32>,
        test_labels: &[usize],
    ) -> Result<(SequenceModel, TrainingOutcome)> {
        let n_val = validation_len(train_labels.len(), self.config.validation_fraction);
        if n_val == 0 {
            return Err(ActimateError::InsufficientData {
                message: format!(
                    "{} training windows leave nothing for validation",
                    train_labels.len()
                ),
            });
        }
        let n_fit = train_labels.len() - n_val;
        let fit_x = train.slice_axis(Axis(0), (..n_fit).into()).to_owned();
        let val_x = train.slice_axis(Axis(0), (n_fit..).into()).to_owned();
        let (fit_y, val_y) = train_labels.split_at(n_fit);
        info!(
            "Sequence training: {} windows, {} validation, {} test",
            n_fit,
            n_val,
            test_labels.len()
        );

        let model = SequenceModel::new(self.arch.clone())?;
        let mut lr = self.config.learning_rate;
        let mut optimizer = AdamW::new(
            model.varmap().all_vars(),
            ParamsAdamW {
                lr,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut stopper = EarlyStopping::new(self.config.early_stopping_patience);
        let mut plateau = PlateauScheduler::new(
            self.config.lr_plateau_factor,
            self.config.lr_plateau_patience,
            self.config.min_learning_rate,
            defaults::LR_PLATEAU_MIN_DELTA,
        );
        let mut checkpoint = BestTracker::default();
        let checkpoint_path = self.output.artifact(defaults::BEST_CHECKPOINT_FILE);
        let mut best_weights = None;
        let mut history = TrainingHistory::default();
        let mut order: Vec<usize> = (0..n_fit).collect();

        for epoch in 0..self.config.max_epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f64;
            let mut correct = 0usize;
            for chunk in order.chunks(self.config.batch_size.max(1)) {
                let xs = batch_tensor(&fit_x, chunk, model.device())?;
                let ys = label_tensor(fit_y, chunk, model.device())?;
                let logits = model.network().forward_t(&xs, true)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &ys)?;
                optimizer.backward_step(&loss)?;
                loss_sum += f64::from(loss.to_scalar::<f32>()?) * chunk.len() as f64;
                correct += count_correct(&logits, &ys)?;
            }

            let (val_loss, val_accuracy) =
                model.evaluate(&val_x, val_y, self.config.batch_size)?;
            let record = EpochRecord {
                epoch: epoch + 1,
                loss: loss_sum / n_fit as f64,
                accuracy: correct as f64 / n_fit as f64,
                val_loss,
                val_accuracy,
                learning_rate: lr,
            };
            info!(
                "Epoch {}/{}: loss {:.4}, accuracy {:.4}, val_loss {:.4}, val_accuracy {:.4}",
                record.epoch,
                self.config.max_epochs,
                record.loss,
                record.accuracy,
                val_loss,
                val_accuracy
            );
            history.epochs.push(record);

            let decision = stopper.update(epoch + 1, val_loss);
            if decision.improved {
                best_weights = Some(model.snapshot()?);
            }

            if let Some(new_lr) = plateau.step(val_loss, lr) {
                info!("Reducing learning rate to {:e}", new_lr);
                lr = new_lr;
                optimizer.set_learning_rate(lr);
            }

            if checkpoint.update(val_accuracy) {
                debug!(
                    "val_accuracy improved to {:.4}, saving {}",
                    val_accuracy,
                    checkpoint_path.display()
                );
                model.save(&checkpoint_path)?;
            }

            if decision.stop {
                info!("Early stopping after epoch {}", epoch + 1);
                break;
            }
        }

        if let Some(weights) = &best_weights {
            info!(
                "Restoring weights from epoch {}",
                stopper.best_epoch().unwrap_or_default()
            );
            model.restore(weights)?;
        }

        let (test_loss, test_accuracy) =
            model.evaluate(test, test_labels, self.config.batch_size)?;
        info!("Test loss {:.4}, test accuracy {:.4}", test_loss, test_accuracy);

        history.save(&self.output.artifact(defaults::TRAINING_HISTORY_FILE))?;
        model.save(&self.output.artifact(defaults::SEQUENCE_MODEL_FILE))?;

        Ok((
            model,
            TrainingOutcome {
                history,
                best_epoch: stopper.best_epoch(),
                test_loss,
                test_accuracy,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tiny_arch() -> Architecture {
        Architecture {
            window_len: 5,
            channels: 2,
            lstm_hidden: 3,
            lstm2_hidden: 3,
            dense_hidden: 2,
            n_classes: 2,
            ..Architecture::default()
        }
    }

    fn data(n: usize) -> (Array3<f32>, Vec<usize>) {
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let x = Array3::from_shape_fn((n, 5, 2), |(i, t, _)| {
            if labels[i] == 0 { 0.1 * t as f32 } else { -0.1 * t as f32 }
        });
        (x, labels)
    }

    #[test]
    fn training_writes_artifacts_and_history() {
        let dir = TempDir::new().unwrap();
        let output = OutputConfig {
            dir: dir.path().to_path_buf(),
        };
        let config = SequenceConfig {
            batch_size: 4,
            max_epochs: 3,
            ..SequenceConfig::default()
        };
        let (train, train_y) = data(20);
        let (test, test_y) = data(6);

        let trainer = SequenceTrainer::new(&config, &output, tiny_arch(), 42);
        let (_, outcome) = trainer.fit(&train, &train_y, &test, &test_y).unwrap();

        assert_eq!(outcome.history.epochs.len(), 3);
        assert!(outcome.best_epoch.is_some());
        assert!((0.0..=1.0).contains(&outcome.test_accuracy));
        assert!(dir.path().join(defaults::BEST_CHECKPOINT_FILE).exists());
        assert!(dir.path().join(defaults::SEQUENCE_MODEL_FILE).exists());

        let history =
            TrainingHistory::load(&dir.path().join(defaults::TRAINING_HISTORY_FILE)).unwrap();
        assert_eq!(history, outcome.history);
        assert_eq!(history.epochs[0].learning_rate, config.learning_rate);
    }

    #[test]
    fn single_window_cannot_be_split_for_validation() {
        let dir = TempDir::new().unwrap();
        let output = OutputConfig {
            dir: dir.path().to_path_buf(),
        };
        let config = SequenceConfig::default();
        let (train, train_y) = data(1);
        let trainer = SequenceTrainer::new(&config, &output, tiny_arch(), 42);
        assert!(matches!(
            trainer.fit(&train, &train_y, &train, &train_y),
            Err(ActimateError::InsufficientData { .. })
        ));
    }
}
