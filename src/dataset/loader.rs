//! Dataset discovery and per-sample loading.
//!
//! Expected layout:
//!
//! ```text
//! <root>/
//!   <activity>/
//!     <sample_id>/
//!       accelerometer.txt
//!       gyroscope.txt
//!       magnetometer.txt
//! ```
//!
//! A sample that cannot be used is never fatal: it becomes a
//! [`SampleOutcome::Skipped`] and ends up in the [`LoadManifest`].

use crate::config::DatasetConfig;
use crate::dataset::sensor::{SensorKind, Triple, read_sensor_file};
use crate::dataset::window::window_count;
use crate::defaults::NUM_CHANNELS;
use crate::error::{ActimateError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One aligned recording session.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Class index (position of the activity in the configured list).
    pub label: usize,
    pub activity: String,
    pub sample_id: String,
    pub path: PathBuf,
    /// `L × 9` signal: acc xyz, mag xyz, gyro xyz.
    pub signal: Array2<f32>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.signal.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.nrows() == 0
    }
}

/// Why a sample directory did not produce a [`Sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingActivityDir,
    UnreadableActivityDir { message: String },
    MissingSensorFile { sensor: SensorKind },
    Parse { message: String },
    TooShort { length: usize, required: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingActivityDir => write!(f, "activity directory missing"),
            SkipReason::UnreadableActivityDir { message } => {
                write!(f, "activity directory unreadable: {}", message)
            }
            SkipReason::MissingSensorFile { sensor } => {
                write!(f, "missing {}", sensor.file_name())
            }
            SkipReason::Parse { message } => write!(f, "{}", message),
            SkipReason::TooShort { length, required } => {
                write!(f, "only {} aligned rows, need {}", length, required)
            }
        }
    }
}

/// A sample (or activity directory) that was left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSample {
    pub activity: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of loading a single sample directory.
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    Loaded(Sample),
    Skipped(SkippedSample),
}

/// Summary of a loaded sample, as written to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedRecord {
    pub activity: String,
    pub label: usize,
    pub sample_id: String,
    pub aligned_len: usize,
    pub windows: usize,
}

/// Diagnostics for one dataset pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadManifest {
    pub root: PathBuf,
    pub window_len: usize,
    pub loaded: Vec<LoadedRecord>,
    pub skipped: Vec<SkippedSample>,
}

impl LoadManifest {
    /// Windows contributed per class index.
    pub fn windows_per_label(&self, num_labels: usize) -> Vec<usize> {
        let mut counts = vec![0; num_labels];
        for record in &self.loaded {
            if let Some(count) = counts.get_mut(record.label) {
                *count += record.windows;
            }
        }
        counts
    }

    pub fn total_windows(&self) -> usize {
        self.loaded.iter().map(|r| r.windows).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Samples plus the manifest describing how they were gathered.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub samples: Vec<Sample>,
    pub manifest: LoadManifest,
}

/// Walks the dataset tree described by a [`DatasetConfig`].
pub struct DatasetLoader<'a> {
    config: &'a DatasetConfig,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(config: &'a DatasetConfig) -> Self {
        Self { config }
    }

    /// Load every usable sample, activity by activity.
    ///
    /// Fails only when the dataset root itself is missing; an activity
    /// directory that cannot be listed is recorded as skipped.
    pub fn load(&self) -> Result<LoadedDataset> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(ActimateError::DatasetNotFound {
                path: root.display().to_string(),
            });
        }

        let mut manifest = LoadManifest {
            root: root.clone(),
            window_len: self.config.window_len,
            ..LoadManifest::default()
        };
        let mut samples = Vec::new();

        for (label, activity) in self.config.activities.iter().enumerate() {
            info!("Processing {} data...", activity);
            let activity_path = root.join(activity);
            if !activity_path.is_dir() {
                warn!("Activity directory {} not found, skipping", activity_path.display());
                manifest.skipped.push(SkippedSample {
                    activity: activity.clone(),
                    path: activity_path,
                    reason: SkipReason::MissingActivityDir,
                });
                continue;
            }

            let dirs = match sample_dirs(&activity_path) {
                Ok(dirs) => dirs,
                Err(e) => {
                    warn!("Cannot read {}: {}, skipping", activity_path.display(), e);
                    manifest.skipped.push(SkippedSample {
                        activity: activity.clone(),
                        path: activity_path,
                        reason: SkipReason::UnreadableActivityDir {
                            message: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let before = samples.len();
            for sample_dir in dirs {
                match load_sample(&sample_dir, label, activity, self.config.window_len) {
                    SampleOutcome::Loaded(sample) => {
                        manifest.loaded.push(LoadedRecord {
                            activity: activity.clone(),
                            label,
                            sample_id: sample.sample_id.clone(),
                            aligned_len: sample.len(),
                            windows: window_count(
                                sample.len(),
                                self.config.window_len,
                                self.config.stride(),
                            ),
                        });
                        samples.push(sample);
                    }
                    SampleOutcome::Skipped(skipped) => {
                        match &skipped.reason {
                            SkipReason::Parse { .. } => warn!(
                                "Error processing {}: {}",
                                skipped.path.display(),
                                skipped.reason
                            ),
                            reason => debug!("Skipping {}: {}", skipped.path.display(), reason),
                        }
                        manifest.skipped.push(skipped);
                    }
                }
            }
            info!("  {} usable samples for {}", samples.len() - before, activity);
        }

        Ok(LoadedDataset { samples, manifest })
    }
}

/// Sample directories of one activity, sorted by name.
///
/// Entries that are not directories, or that cannot be read, are ignored.
fn sample_dirs(activity_path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(activity_path)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", activity_path.display(), e);
                continue;
            }
        };
        if path.is_dir() {
            dirs.push(path);
        } else {
            debug!("Ignoring non-directory entry {}", path.display());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Load and align the three sensor files of one sample directory.
pub fn load_sample(dir: &Path, label: usize, activity: &str, min_len: usize) -> SampleOutcome {
    let skipped = |reason: SkipReason| {
        SampleOutcome::Skipped(SkippedSample {
            activity: activity.to_string(),
            path: dir.to_path_buf(),
            reason,
        })
    };

    for sensor in SensorKind::ALL {
        if !dir.join(sensor.file_name()).is_file() {
            return skipped(SkipReason::MissingSensorFile { sensor });
        }
    }

    let read = |sensor: SensorKind| read_sensor_file(&dir.join(sensor.file_name()));
    let parsed = read(SensorKind::Accelerometer).and_then(|acc| {
        let gyro = read(SensorKind::Gyroscope)?;
        let mag = read(SensorKind::Magnetometer)?;
        Ok((acc, gyro, mag))
    });
    let (acc, gyro, mag) = match parsed {
        Ok(triples) => triples,
        Err(e) => {
            return skipped(SkipReason::Parse {
                message: e.to_string(),
            });
        }
    };

    let signal = align(&acc, &gyro, &mag);
    if signal.nrows() < min_len {
        return skipped(SkipReason::TooShort {
            length: signal.nrows(),
            required: min_len,
        });
    }

    let sample_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    SampleOutcome::Loaded(Sample {
        label,
        activity: activity.to_string(),
        sample_id,
        path: dir.to_path_buf(),
        signal,
    })
}

/// Truncate all sensors to the shortest one and concatenate the channels.
///
/// Channel order is acc xyz, mag xyz, gyro xyz; the inference app feeds
/// its buffer in the same order.
pub fn align(acc: &[Triple], gyro: &[Triple], mag: &[Triple]) -> Array2<f32> {
    let len = acc.len().min(gyro.len()).min(mag.len());
    let mut signal = Array2::<f32>::zeros((len, NUM_CHANNELS));
    for t in 0..len {
        for axis in 0..3 {
            signal[[t, axis]] = acc[t][axis];
            signal[[t, 3 + axis]] = mag[t][axis];
            signal[[t, 6 + axis]] = gyro[t][axis];
        }
    }
    signal
}

/// Human readable channel names in signal order.
pub fn channel_names() -> Vec<String> {
    [SensorKind::Accelerometer, SensorKind::Magnetometer, SensorKind::Gyroscope]
        .iter()
        .flat_map(|s| ["x", "y", "z"].iter().map(move |a| format!("{}_{}", s.prefix(), a)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triples(n: usize, base: f32) -> Vec<Triple> {
        (0..n)
            .map(|i| [base + i as f32, base + 100.0 + i as f32, base + 200.0 + i as f32])
            .collect()
    }

    #[test]
    fn listing_a_non_directory_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(sample_dirs(file.path()).is_err());
    }

    #[test]
    fn sample_dirs_are_sorted_and_skip_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let dirs = sample_dirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_activity_dir_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::TempDir::new().unwrap();
        let locked = root.path().join("walking");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user (e.g. root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let config = DatasetConfig {
            root: root.path().to_path_buf(),
            activities: vec!["walking".to_string()],
            ..DatasetConfig::default()
        };
        let loaded = DatasetLoader::new(&config).load();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let manifest = loaded.unwrap().manifest;
        assert_eq!(manifest.skipped.len(), 1);
        assert!(matches!(
            manifest.skipped[0].reason,
            SkipReason::UnreadableActivityDir { .. }
        ));
    }

    #[test]
    fn aligned_length_is_shortest_sensor() {
        let signal = align(&triples(120, 0.0), &triples(97, 1.0), &triples(103, 2.0));
        assert_eq!(signal.dim(), (97, NUM_CHANNELS));
    }

    #[test]
    fn channel_order_is_acc_mag_gyro() {
        let acc = vec![[1.0, 2.0, 3.0]];
        let gyro = vec![[7.0, 8.0, 9.0]];
        let mag = vec![[4.0, 5.0, 6.0]];
        let signal = align(&acc, &gyro, &mag);
        let row: Vec<f32> = signal.row(0).to_vec();
        assert_eq!(row, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn channel_names_follow_signal_order() {
        let names = channel_names();
        assert_eq!(names.len(), NUM_CHANNELS);
        assert_eq!(names[0], "acc_x");
        assert_eq!(names[3], "mag_x");
        assert_eq!(names[8], "gyro_z");
    }

    #[test]
    fn empty_sensor_aligns_to_zero_rows() {
        let signal = align(&triples(10, 0.0), &[], &triples(10, 0.0));
        assert_eq!(signal.nrows(), 0);
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(
            SkipReason::MissingSensorFile {
                sensor: SensorKind::Gyroscope
            }
            .to_string(),
            "missing gyroscope.txt"
        );
        assert_eq!(
            SkipReason::TooShort {
                length: 12,
                required: 50
            }
            .to_string(),
            "only 12 aligned rows, need 50"
        );
        assert_eq!(
            SkipReason::UnreadableActivityDir {
                message: "Permission denied".to_string()
            }
            .to_string(),
            "activity directory unreadable: Permission denied"
        );
    }

    #[test]
    fn manifest_counts_windows_per_label() {
        let manifest = LoadManifest {
            loaded: vec![
                LoadedRecord {
                    activity: "running".to_string(),
                    label: 1,
                    sample_id: "a".to_string(),
                    aligned_len: 100,
                    windows: 3,
                },
                LoadedRecord {
                    activity: "running".to_string(),
                    label: 1,
                    sample_id: "b".to_string(),
                    aligned_len: 50,
                    windows: 1,
                },
            ],
            ..LoadManifest::default()
        };
        assert_eq!(manifest.windows_per_label(3), vec![0, 4, 0]);
        assert_eq!(manifest.total_windows(), 4);
    }
}
