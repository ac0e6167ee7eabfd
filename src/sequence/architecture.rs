//! Layer sizes of the recurrent classifier and the names of its weights.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// Layer sizes and dropout rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub window_len: usize,
    pub channels: usize,
    pub lstm_hidden: usize,
    pub lstm2_hidden: usize,
    pub dense_hidden: usize,
    pub n_classes: usize,
    pub recurrent_dropout: f32,
    pub dense_dropout: f32,
}

impl Default for Architecture {
    fn default() -> Self {
        Self {
            window_len: defaults::WINDOW_LEN,
            channels: defaults::NUM_CHANNELS,
            lstm_hidden: defaults::LSTM_HIDDEN,
            lstm2_hidden: defaults::LSTM2_HIDDEN,
            dense_hidden: defaults::DENSE_HIDDEN,
            n_classes: defaults::ACTIVITIES.len(),
            recurrent_dropout: defaults::RECURRENT_DROPOUT,
            dense_dropout: defaults::DENSE_DROPOUT,
        }
    }
}

/// Variable-store prefixes, in forward order.
pub mod layer {
    pub const BILSTM_FORWARD: &str = "bilstm_fwd";
    pub const BILSTM_BACKWARD: &str = "bilstm_bwd";
    pub const NORM1: &str = "norm1";
    pub const LSTM2: &str = "lstm2";
    pub const NORM2: &str = "norm2";
    pub const DENSE: &str = "dense";
    pub const NORM3: &str = "norm3";
    pub const HEAD: &str = "head";
}
