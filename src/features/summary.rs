//! Summary-statistic features for the classical classifiers.
//!
//! Each window collapses into `4 × channels` values laid out statistic-major:
//! every channel's mean, then every channel's std, then the minima, then the
//! maxima. Training and inference must share this exact layout, so
//! [`reduce_window`] is the only place that defines it.

use crate::dataset::Window;
use crate::dataset::loader::channel_names;
use crate::error::{ActimateError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Statistic names in feature order.
pub const STATISTICS: [&str; 4] = ["mean", "std", "min", "max"];

/// Reduce one `timesteps × channels` window to its feature vector.
///
/// `std` is the sample standard deviation (one delta degree of freedom);
/// a single-row window reports 0.
pub fn reduce_window(data: ArrayView2<'_, f32>) -> Array1<f32> {
    let rows = data.nrows();
    let channels = data.ncols();
    let mut features = Array1::<f32>::zeros(STATISTICS.len() * channels);
    if rows == 0 {
        return features;
    }

    let mean = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(channels));
    let std = if rows > 1 {
        data.std_axis(Axis(0), 1.0)
    } else {
        Array1::zeros(channels)
    };
    let min = data.fold_axis(Axis(0), f32::INFINITY, |acc, &v| acc.min(v));
    let max = data.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, &v| acc.max(v));

    for (block, stat) in [mean, std, min, max].iter().enumerate() {
        features
            .slice_mut(ndarray::s![block * channels..(block + 1) * channels])
            .assign(stat);
    }
    features
}

/// Feature matrix (`n × 4·channels`) for a list of windows.
pub fn reduce_windows(windows: &[Window]) -> Result<Array2<f32>> {
    let channels = windows.first().map(|w| w.data.ncols()).unwrap_or(0);
    let width = STATISTICS.len() * channels;
    let mut matrix = Array2::<f32>::zeros((windows.len(), width));
    for (i, window) in windows.iter().enumerate() {
        if window.data.ncols() != channels {
            return Err(ActimateError::ShapeMismatch {
                expected: format!("{} channels", channels),
                actual: format!("{} channels", window.data.ncols()),
            });
        }
        matrix.row_mut(i).assign(&reduce_window(window.data.view()));
    }
    Ok(matrix)
}

/// Column names of the feature matrix (`mean_acc_x`, ..., `max_gyro_z`).
pub fn feature_names() -> Vec<String> {
    let channels = channel_names();
    STATISTICS
        .iter()
        .flat_map(|stat| channels.iter().map(move |ch| format!("{}_{}", stat, ch)))
        .collect()
}
