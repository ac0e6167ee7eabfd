//! Recurrent sequence classifier. The network and its training loop need the
//! `sequence` feature (candle).

pub mod architecture;
pub mod callbacks;
#[cfg(feature = "sequence")]
pub mod model;
#[cfg(feature = "sequence")]
pub mod trainer;

pub use architecture::Architecture;
pub use callbacks::{BestTracker, EarlyStopping, PlateauScheduler};
#[cfg(feature = "sequence")]
pub use model::{BiLstmClassifier, NamedTensor, SequenceModel};
#[cfg(feature = "sequence")]
pub use trainer::{EpochRecord, SequenceTrainer, TrainingHistory, TrainingOutcome};
