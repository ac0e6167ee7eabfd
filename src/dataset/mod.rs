//! Loading labeled sensor recordings and windowing them into examples.

pub mod loader;
pub mod sensor;
pub mod window;

pub use loader::{
    DatasetLoader, LoadManifest, LoadedDataset, LoadedRecord, Sample, SampleOutcome, SkipReason,
    SkippedSample,
};
pub use sensor::SensorKind;
pub use window::{Window, build_windows, window_count, windows_for_sample};
