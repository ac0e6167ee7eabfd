//! Sensor file parsing.
//!
//! Every sensor file holds one reading per line: `timestamp x y z`,
//! tab separated, without a header. The timestamp is discarded.

use crate::defaults;
use crate::error::{ActimateError, Result};
use csv::{ReaderBuilder, Trim};
use std::fmt;
use std::path::Path;

/// One x/y/z reading.
pub type Triple = [f32; 3];

/// The three inertial sensors recorded per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl SensorKind {
    /// All sensors, in the order they are checked on disk.
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::Magnetometer,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => defaults::ACCELEROMETER_FILE,
            SensorKind::Gyroscope => defaults::GYROSCOPE_FILE,
            SensorKind::Magnetometer => defaults::MAGNETOMETER_FILE,
        }
    }

    /// Channel name prefix used in reports (`acc_x`, `gyro_y`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "acc",
            SensorKind::Gyroscope => "gyro",
            SensorKind::Magnetometer => "mag",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Gyroscope => "gyroscope",
            SensorKind::Magnetometer => "magnetometer",
        };
        f.write_str(name)
    }
}

/// Read every x/y/z reading of a sensor file.
///
/// Lines are tab separated; a line without tabs is split on whitespace
/// instead. Blank lines are ignored. Any other malformed line fails the
/// whole file.
pub fn read_sensor_file(path: &Path) -> Result<Vec<Triple>> {
    let parse_error = |message: String| ActimateError::SensorParse {
        path: path.display().to_string(),
        message,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(e.to_string()))?;

    let mut readings = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| parse_error(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let fields: Vec<&str> = if record.len() == 1 {
            record[0].split_whitespace().collect()
        } else {
            record.iter().collect()
        };
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        if fields.len() != 4 {
            return Err(parse_error(format!(
                "line {}: expected 4 fields (timestamp x y z), found {}",
                line,
                fields.len()
            )));
        }

        // Timestamps may be integer nanoseconds or floats; only validate them.
        // NaN and infinities parse as floats but are rejected like any other bad value.
        let timestamp = fields[0]
            .parse::<f64>()
            .map_err(|_| parse_error(format!("line {}: invalid timestamp '{}'", line, fields[0])))?;
        if !timestamp.is_finite() {
            return Err(parse_error(format!(
                "line {}: invalid timestamp '{}'",
                line, fields[0]
            )));
        }

        let mut triple = [0.0f32; 3];
        for (axis, raw) in fields[1..].iter().enumerate() {
            let value = raw
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| parse_error(format!("line {}: invalid value '{}'", line, raw)))?;
            triple[axis] = value;
        }
        readings.push(triple);
    }

    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_tab_separated_rows_and_drops_timestamp() {
        let file = write_file("1000\t0.1\t-9.8\t0.3\n1020\t0.2\t-9.7\t0.4\n");
        let readings = read_sensor_file(file.path()).unwrap();
        assert_eq!(readings, vec![[0.1, -9.8, 0.3], [0.2, -9.7, 0.4]]);
    }

    #[test]
    fn accepts_space_separated_rows() {
        let file = write_file("1 1.0 2.0 3.0\n2   4.0 5.0 6.0\n");
        let readings = read_sensor_file(file.path()).unwrap();
        assert_eq!(readings, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn skips_blank_lines() {
        let file = write_file("1\t1\t2\t3\n\n2\t4\t5\t6\n");
        let readings = read_sensor_file(file.path()).unwrap();
        assert_eq!(readings.len(), 2);
    }

    #[test]
    fn rejects_short_rows() {
        let file = write_file("1\t1\t2\t3\n2\t4\n");
        let err = read_sensor_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("expected 4 fields"), "{}", err);
    }

    #[test]
    fn rejects_non_numeric_values() {
        let file = write_file("1\t1\tabc\t3\n");
        let err = read_sensor_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid value 'abc'"), "{}", err);
    }

    #[test]
    fn rejects_non_finite_values() {
        for row in ["1\tNaN\t0.1\t0.2\n", "1\t0.1\tinf\t0.2\n", "1\t0.1\t0.2\t-inf\n"] {
            let file = write_file(&format!("0\t1\t2\t3\n{}", row));
            let err = read_sensor_file(file.path()).unwrap_err();
            assert!(matches!(err, ActimateError::SensorParse { .. }));
            assert!(err.to_string().contains("line 2: invalid value"), "{}", err);
        }
    }

    #[test]
    fn rejects_non_finite_timestamp() {
        let file = write_file("NaN\t1\t2\t3\n");
        let err = read_sensor_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp 'NaN'"), "{}", err);
    }

    #[test]
    fn empty_file_has_no_readings() {
        let file = write_file("");
        assert!(read_sensor_file(file.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_parse_error() {
        let err = read_sensor_file(Path::new("/tmp/actimate_missing_sensor.txt")).unwrap_err();
        assert!(matches!(err, ActimateError::SensorParse { .. }));
    }

    #[test]
    fn sensor_file_names() {
        assert_eq!(SensorKind::Accelerometer.file_name(), "accelerometer.txt");
        assert_eq!(SensorKind::Gyroscope.file_name(), "gyroscope.txt");
        assert_eq!(SensorKind::Magnetometer.file_name(), "magnetometer.txt");
        assert_eq!(SensorKind::Magnetometer.to_string(), "magnetometer");
    }
}
