//! Feature stages: z-score normalization for sequences, summary statistics
//! and standard scaling for the classical classifiers.

pub mod normalize;
pub mod scaler;
pub mod summary;

pub use normalize::NormalizationParams;
pub use scaler::FeatureScaler;
pub use summary::{feature_names, reduce_window, reduce_windows};
