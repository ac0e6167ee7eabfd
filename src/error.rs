//! Error types for actimate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActimateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Dataset errors
    #[error("Dataset directory not found at {path}")]
    DatasetNotFound { path: String },

    #[error("Failed to parse sensor file {path}: {message}")]
    SensorParse { path: String, message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    // Training errors
    #[error("Training failed: {message}")]
    Training { message: String },

    #[cfg(feature = "sequence")]
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    // Export errors
    #[error("Unsupported model structure for {model}: {message}")]
    UnsupportedModelStructure { model: String, message: String },

    // Commit helper errors
    #[error("Date format error: '{input}' is not a valid YYYY-MM-DD HH:MM:SS date ({message})")]
    CommitDateFormat { input: String, message: String },

    #[error("git tool not found: {tool}")]
    GitToolNotFound { tool: String },

    #[error("Error during git operation: {message}")]
    GitCommand { message: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary model encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ActimateError {
    /// Process exit code for the commit helper.
    ///
    /// Date format problems are reported separately from failing git steps.
    pub fn exit_code(&self) -> i32 {
        match self {
            ActimateError::CommitDateFormat { .. } => 2,
            _ => 1,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ActimateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = ActimateError::ConfigInvalidValue {
            key: "dataset.window_len".to_string(),
            message: "must be at least 2".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for dataset.window_len: must be at least 2"
        );
    }

    #[test]
    fn test_dataset_not_found_display() {
        let error = ActimateError::DatasetNotFound {
            path: "/data/har".to_string(),
        };
        assert_eq!(error.to_string(), "Dataset directory not found at /data/har");
    }

    #[test]
    fn test_sensor_parse_display() {
        let error = ActimateError::SensorParse {
            path: "walking/s1/gyroscope.txt".to_string(),
            message: "line 3: expected 4 fields, found 2".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse sensor file walking/s1/gyroscope.txt: line 3: expected 4 fields, found 2"
        );
    }

    #[test]
    fn test_insufficient_data_display() {
        let error = ActimateError::InsufficientData {
            message: "class 'running' has a single example".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Insufficient data: class 'running' has a single example"
        );
    }

    #[test]
    fn test_unsupported_model_structure_display() {
        let error = ActimateError::UnsupportedModelStructure {
            model: "rf_model".to_string(),
            message: "ensemble has no trees".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unsupported model structure for rf_model: ensemble has no trees"
        );
    }

    #[test]
    fn test_commit_date_format_display() {
        let error = ActimateError::CommitDateFormat {
            input: "2024-02-30 10:00:00".to_string(),
            message: "input is out of range".to_string(),
        };
        assert!(error.to_string().starts_with("Date format error"));
        assert!(error.to_string().contains("2024-02-30 10:00:00"));
    }

    #[test]
    fn test_git_command_display() {
        let error = ActimateError::GitCommand {
            message: "git commit exited with status 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Error during git operation: git commit exited with status 1"
        );
    }

    #[test]
    fn test_exit_codes_distinguish_format_from_operation() {
        let format = ActimateError::CommitDateFormat {
            input: "x".to_string(),
            message: "bad".to_string(),
        };
        let operation = ActimateError::GitCommand {
            message: "boom".to_string(),
        };
        assert_eq!(format.exit_code(), 2);
        assert_eq!(operation.exit_code(), 1);
        assert_eq!(ActimateError::Other("x".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_other_display() {
        let error = ActimateError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: ActimateError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: ActimateError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: ActimateError = json_error.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: ActimateError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ActimateError>();
        assert_sync::<ActimateError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(ActimateError::Other("test error".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
