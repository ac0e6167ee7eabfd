//! Synthetic dataset trees for integration tests.

#![allow(dead_code)]

use actimate::config::Config;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const ACTIVITIES: [&str; 3] = ["standing", "walking", "running"];
pub const WINDOW_LEN: usize = 20;

/// Tab-separated `timestamp x y z` lines for one sensor.
fn sensor_text(rows: usize, label: usize, sensor: usize, phase: f32) -> String {
    let mut text = String::new();
    for t in 0..rows {
        let base = label as f32 * 4.0 + sensor as f32;
        let wave = ((t as f32) * 0.3 * (label + 1) as f32 + phase).sin() * (label + 1) as f32;
        writeln!(
            text,
            "{}\t{:.5}\t{:.5}\t{:.5}",
            1_000 + t * 20,
            base + wave,
            base - wave,
            base + 0.5 * wave
        )
        .unwrap();
    }
    text
}

/// Write one sample directory with all three sensor files.
pub fn write_sample(root: &Path, activity: &str, sample: &str, label: usize, rows: usize) {
    let dir = root.join(activity).join(sample);
    fs::create_dir_all(&dir).unwrap();
    let phase = sample.len() as f32 * 0.7;
    for (sensor, file) in ["accelerometer.txt", "gyroscope.txt", "magnetometer.txt"]
        .iter()
        .enumerate()
    {
        fs::write(dir.join(file), sensor_text(rows, label, sensor, phase)).unwrap();
    }
}

/// Three activities, `samples` recordings of `rows` rows each.
pub fn write_dataset(root: &Path, samples: usize, rows: usize) {
    for (label, activity) in ACTIVITIES.iter().enumerate() {
        for s in 0..samples {
            write_sample(root, activity, &format!("sample_{:02}", s), label, rows);
        }
    }
}

/// Config pointing at `<dir>/dataset` and `<dir>/out` with small models.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.dataset.root = dir.join("dataset");
    config.dataset.activities = ACTIVITIES.iter().map(|s| s.to_string()).collect();
    config.dataset.window_len = WINDOW_LEN;
    config.output.dir = dir.join("out");
    config.classical.n_estimators = 10;
    config.classical.gbt_max_depth = 3;
    config.sequence.max_epochs = 2;
    config.sequence.batch_size = 16;
    config
}
