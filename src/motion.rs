//! Motion sensor input.
//!
//! The PIR/microwave sensor sits on an ADC channel; idle readings hover
//! around a few hundred and a trip reads in the thousands. The core only
//! compares the raw level against a configured threshold.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Supplies the latest raw activity level. Never fails; a sensor that cannot
/// be read reports 0.
pub trait MotionSensor {
    fn read(&mut self) -> u16;
}

/// Reads a raw ADC sample from a sysfs node, e.g.
/// `/sys/bus/iio/devices/iio:device0/in_voltage0_raw`.
///
/// A failed or garbled read reports 0, so a dead sensor never holds the
/// weather up.
pub struct SysfsMotionSensor {
    path: PathBuf,
    warned: bool,
}

#[derive(Error, Debug)]
pub enum MotionError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a number: {0:?}")]
    Garbled(String),
}

impl SysfsMotionSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            warned: false,
        }
    }

    fn sample(&self) -> Result<u16, MotionError> {
        let raw = fs::read_to_string(&self.path)?;
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|_| MotionError::Garbled(raw.clone()))?;
        Ok(value.clamp(0, u16::MAX as i64) as u16)
    }
}

impl MotionSensor for SysfsMotionSensor {
    fn read(&mut self) -> u16 {
        match self.sample() {
            Ok(value) => {
                self.warned = false;
                value
            }
            Err(e) => {
                // Once per outage; the loop reads at 5-10 Hz
                if !self.warned {
                    tracing::warn!("Motion sensor read from {} failed: {}", self.path.display(), e);
                    self.warned = true;
                }
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("312\n", 312)]
    #[case("  4095 ", 4095)]
    #[case("-5", 0)]
    #[case("70000", u16::MAX)]
    fn reads_and_clamps(#[case] contents: &str, #[case] expected: u16) {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("in_voltage0_raw");
        fs::write(&node, contents).unwrap();

        let mut sensor = SysfsMotionSensor::new(&node);
        assert_eq!(sensor.read(), expected);
    }

    #[test]
    fn missing_node_reads_zero() {
        let tmp = TempDir::new().unwrap();
        let mut sensor = SysfsMotionSensor::new(tmp.path().join("nope"));
        assert_eq!(sensor.read(), 0);
    }

    #[test]
    fn failed_read_after_a_trip_reports_no_motion() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("in_voltage0_raw");
        fs::write(&node, "2048").unwrap();

        let mut sensor = SysfsMotionSensor::new(&node);
        assert_eq!(sensor.read(), 2048);

        fs::write(&node, "garbage").unwrap();
        assert_eq!(sensor.read(), 0);

        fs::remove_file(&node).unwrap();
        assert_eq!(sensor.read(), 0);

        fs::write(&node, "300").unwrap();
        assert_eq!(sensor.read(), 300);
    }

    #[test]
    fn garbled_sample_is_typed_error() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("in_voltage0_raw");
        fs::write(&node, "x1").unwrap();

        let sensor = SysfsMotionSensor::new(&node);
        assert!(matches!(sensor.sample(), Err(MotionError::Garbled(raw)) if raw == "x1"));
    }
}
