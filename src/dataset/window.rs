//! Fixed-length overlapping windows over aligned samples.

use crate::dataset::loader::Sample;
use ndarray::{Array2, Array3, s};

/// One training example: `window_len × 9` readings and the sample's label.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub label: usize,
    pub sample_id: String,
    /// Offset of the first row inside the sample.
    pub start: usize,
    pub data: Array2<f32>,
}

/// Number of windows a signal of `len` rows produces.
///
/// The partial tail is dropped, so this is
/// `floor((len - window_len) / stride) + 1` when the signal is long enough.
pub fn window_count(len: usize, window_len: usize, stride: usize) -> usize {
    if window_len == 0 || stride == 0 || len < window_len {
        return 0;
    }
    (len - window_len) / stride + 1
}

/// Slice one sample into windows at stride `window_len / 2`.
pub fn windows_for_sample(sample: &Sample, window_len: usize) -> Vec<Window> {
    let stride = window_len / 2;
    let count = window_count(sample.len(), window_len, stride);
    (0..count)
        .map(|i| {
            let start = i * stride;
            Window {
                label: sample.label,
                sample_id: sample.sample_id.clone(),
                start,
                data: sample
                    .signal
                    .slice(s![start..start + window_len, ..])
                    .to_owned(),
            }
        })
        .collect()
}

/// Windows of every sample, in sample order.
pub fn build_windows(samples: &[Sample], window_len: usize) -> Vec<Window> {
    samples
        .iter()
        .flat_map(|sample| windows_for_sample(sample, window_len))
        .collect()
}

/// Stack windows into a `(n, window_len, channels)` tensor.
///
/// Returns `None` when the windows do not share one shape.
pub fn stack_windows(windows: &[Window]) -> Option<Array3<f32>> {
    let (rows, cols) = windows.first().map(|w| w.data.dim())?;
    let mut stacked = Array3::<f32>::zeros((windows.len(), rows, cols));
    for (i, window) in windows.iter().enumerate() {
        if window.data.dim() != (rows, cols) {
            return None;
        }
        stacked.slice_mut(s![i, .., ..]).assign(&window.data);
    }
    Some(stacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::NUM_CHANNELS;
    use std::path::PathBuf;

    fn ramp_sample(len: usize, label: usize) -> Sample {
        let signal = Array2::from_shape_fn((len, NUM_CHANNELS), |(t, c)| (t * 10 + c) as f32);
        Sample {
            label,
            activity: "walking".to_string(),
            sample_id: "s1".to_string(),
            path: PathBuf::from("walking/s1"),
            signal,
        }
    }

    #[test]
    fn hundred_rows_give_three_windows() {
        let sample = ramp_sample(100, 4);
        let windows = windows_for_sample(&sample, 50);

        assert_eq!(windows.len(), 3);
        let starts: Vec<usize> = windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![0, 25, 50]);
        assert!(windows.iter().all(|w| w.label == 4));
        assert!(windows.iter().all(|w| w.data.dim() == (50, NUM_CHANNELS)));
    }

    #[test]
    fn window_rows_come_from_the_right_offset() {
        let sample = ramp_sample(100, 0);
        let windows = windows_for_sample(&sample, 50);
        assert_eq!(windows[1].data[[0, 0]], 250.0);
        assert_eq!(windows[2].data[[49, 8]], 998.0);
    }

    #[test]
    fn tail_is_dropped_not_padded() {
        let sample = ramp_sample(99, 0);
        let windows = windows_for_sample(&sample, 50);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows.last().unwrap().start, 25);
    }

    #[test]
    fn window_count_matches_formula() {
        let w = 50;
        let stride = w / 2;
        for len in 0..400 {
            let expected = if len >= w { (len - w) / stride + 1 } else { 0 };
            assert_eq!(window_count(len, w, stride), expected, "len={}", len);
            let produced = windows_for_sample(&ramp_sample(len, 0), w).len();
            assert_eq!(produced, expected, "len={}", len);
        }
    }

    #[test]
    fn starts_strictly_increase_within_sample() {
        let windows = windows_for_sample(&ramp_sample(317, 2), 50);
        assert!(windows.windows(2).all(|pair| pair[0].start < pair[1].start));
    }

    #[test]
    fn short_sample_has_no_windows() {
        assert!(windows_for_sample(&ramp_sample(49, 0), 50).is_empty());
    }

    #[test]
    fn build_windows_follows_sample_order() {
        let samples = vec![ramp_sample(75, 1), ramp_sample(50, 3)];
        let windows = build_windows(&samples, 50);
        let labels: Vec<usize> = windows.iter().map(|w| w.label).collect();
        assert_eq!(labels, vec![1, 1, 3]);
    }

    #[test]
    fn stack_windows_builds_tensor() {
        let windows = windows_for_sample(&ramp_sample(100, 0), 50);
        let stacked = stack_windows(&windows).unwrap();
        assert_eq!(stacked.dim(), (3, 50, NUM_CHANNELS));
        assert_eq!(stacked[[2, 0, 0]], 500.0);
        assert!(stack_windows(&[]).is_none());
    }
}
