//! Default configuration constants for actimate.
//!
//! This module provides shared constants used across the configuration
//! types and the pipeline stages so that training and export agree on
//! shapes and file names.

/// Activities recognised by the classifier, in class-index order.
///
/// The position in this list is the label written to every window and the
/// output index of every exported model.
pub const ACTIVITIES: [&str; 5] = ["downstairs", "running", "standing", "upstairs", "walking"];

/// Default dataset root, relative to the working directory.
pub const DATASET_PATH: &str = "dataset";

/// Sensor file names expected inside every sample directory.
pub const ACCELEROMETER_FILE: &str = "accelerometer.txt";
pub const GYROSCOPE_FILE: &str = "gyroscope.txt";
pub const MAGNETOMETER_FILE: &str = "magnetometer.txt";

/// Timesteps per window.
///
/// 50 matches the buffer the inference app fills before each prediction.
pub const WINDOW_LEN: usize = 50;

/// Scalar channels per timestep (three sensors, three axes each).
pub const NUM_CHANNELS: usize = 9;

/// Summary statistics per channel (mean, std, min, max).
pub const NUM_STATISTICS: usize = 4;

/// Length of one classical feature vector.
pub const NUM_FEATURES: usize = NUM_CHANNELS * NUM_STATISTICS;

/// Floor applied to zero-variance channel deviations.
pub const STD_EPSILON: f32 = 1e-6;

/// Seed for splits, shuffles and ensemble sampling.
pub const RANDOM_SEED: u64 = 42;

/// Share of the examples used for training; the rest is the test split.
pub const TRAIN_FRACTION: f64 = 0.8;

/// Share of the training split held back for validation (sequence path).
pub const VALIDATION_FRACTION: f64 = 0.2;

// Sequence training hyperparameters
pub const BATCH_SIZE: usize = 32;
pub const MAX_EPOCHS: usize = 50;
pub const LEARNING_RATE: f64 = 0.001;
pub const EARLY_STOPPING_PATIENCE: usize = 15;
pub const LR_PLATEAU_PATIENCE: usize = 8;
pub const LR_PLATEAU_FACTOR: f64 = 0.5;
pub const MIN_LEARNING_RATE: f64 = 1e-6;
pub const LR_PLATEAU_MIN_DELTA: f64 = 1e-4;

// Recurrent architecture
pub const LSTM_HIDDEN: usize = 64;
pub const LSTM2_HIDDEN: usize = 32;
pub const DENSE_HIDDEN: usize = 16;
pub const RECURRENT_DROPOUT: f32 = 0.3;
pub const DENSE_DROPOUT: f32 = 0.2;

// Classical ensembles
pub const N_ESTIMATORS: usize = 100;
pub const ADABOOST_LEARNING_RATE: f32 = 1.0;
pub const GBT_LEARNING_RATE: f32 = 0.3;
pub const GBT_MAX_DEPTH: usize = 6;
pub const GBT_LAMBDA: f32 = 1.0;
pub const GBT_MIN_CHILD_WEIGHT: f32 = 1.0;

// Artifact file names (relative to the output directory)
pub const LOAD_MANIFEST_FILE: &str = "load_manifest.json";
pub const NORMALIZATION_PARAMS_FILE: &str = "normalization_params.json";
pub const BEST_CHECKPOINT_FILE: &str = "best_model.safetensors";
pub const SEQUENCE_MODEL_FILE: &str = "activity_lstm_model.safetensors";
pub const SEQUENCE_PORTABLE_FILE: &str = "activity_lstm_model.portable.json";
pub const TRAINING_HISTORY_FILE: &str = "training_history.json";
pub const FEATURE_SCALER_FILE: &str = "feature_scaler.json";

/// Suffix of every portable inference document.
pub const PORTABLE_SUFFIX: &str = ".portable.json";

/// Suffix of natively serialized ensembles.
pub const NATIVE_SUFFIX: &str = ".bin";

/// Default configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "actimate.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_width_is_channels_times_statistics() {
        assert_eq!(NUM_FEATURES, 36);
    }

    #[test]
    fn stride_is_positive_for_default_window() {
        assert!(WINDOW_LEN / 2 >= 1);
    }
}
