//! Portable JSON documents for trained models.
//!
//! Each document declares its input tensor and embeds the preprocessing the
//! model expects, so it can be consumed without this crate's types.

pub mod sequence;
pub mod tree;

pub use sequence::PortableSequenceModel;
pub use tree::{CompiledEnsemble, PortableTreeEnsemble};

use serde::{Deserialize, Serialize};

/// Version suffix of the `format` field.
pub const FORMAT_VERSION: u32 = 1;

/// Name, shape and element type of a model input or output. `None` marks a
/// dynamic dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<Option<usize>>,
    pub dtype: String,
}

impl TensorSpec {
    pub fn new(name: &str, shape: Vec<Option<usize>>) -> Self {
        Self {
            name: name.to_string(),
            shape,
            dtype: "float32".to_string(),
        }
    }
}

/// Producer string written into every document.
pub fn producer() -> String {
    format!("actimate {}", crate::version_string())
}
