//! Startup configuration. Built once from the command line and never reloaded.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Measurement system requested from the weather feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, clap::ValueEnum, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl Units {
    /// Value of the `units` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
        }
    }

    pub fn temperature_suffix(self) -> &'static str {
        match self {
            Units::Imperial => "F",
            Units::Metric => "C",
        }
    }

    pub fn speed_suffix(self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric => "m/s",
        }
    }
}

/// Time-of-day and motion policy for the mode state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModePolicy {
    /// First dark hour of the night.
    pub quiet_start: u8,
    /// First lit hour of the morning.
    pub quiet_end: u8,
    /// Weekdays (Monday = 0) that get the morning hold.
    pub weekend_days: Vec<u8>,
    /// Weekend mornings stay dark before this hour.
    pub weekend_threshold: u8,
    /// The sprite loop runs from this hour on when nobody triggered the sensor.
    pub day_start: u8,
    /// Weather is only shown before this hour.
    pub night_cutoff: u8,
    /// Raw sensor level that counts as motion (strictly greater than).
    pub motion_threshold: u16,
    /// How long a motion trigger keeps the weather up.
    pub active_window: Duration,
    /// Frames in the sprite sheet.
    pub frame_count: usize,
}

impl Default for ModePolicy {
    fn default() -> Self {
        Self {
            quiet_start: 22,
            quiet_end: 6,
            weekend_days: vec![5, 6],
            weekend_threshold: 10,
            day_start: 7,
            night_cutoff: 22,
            motion_threshold: 1000,
            active_window: Duration::from_secs(60),
            frame_count: 1,
        }
    }
}

impl ModePolicy {
    /// Whether `hour` falls in the quiet window.
    ///
    /// The window normally wraps midnight (22 -> 6); a window with
    /// `quiet_start < quiet_end` is treated as a same-day range.
    pub fn is_quiet_hour(&self, hour: u8) -> bool {
        if self.quiet_start > self.quiet_end {
            hour >= self.quiet_start || hour < self.quiet_end
        } else {
            hour >= self.quiet_start && hour < self.quiet_end
        }
    }

    pub fn is_weekend_morning(&self, weekday: u8, hour: u8) -> bool {
        self.weekend_days.contains(&weekday) && hour < self.weekend_threshold
    }
}

/// Freshness windows for the refresh scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshIntervals {
    pub time_sync: Duration,
    pub weather_sync: Duration,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            time_sync: Duration::from_secs(3600),
            weather_sync: Duration::from_secs(600),
        }
    }
}

/// Main loop pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopTiming {
    /// Sleep after each sprite frame.
    pub frame_duration: Duration,
    /// Sleep after every other tick.
    pub poll_interval: Duration,
    /// Hold after each weather label scroll.
    pub scroll_hold: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_millis(200),
            poll_interval: Duration::from_millis(100),
            scroll_hold: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// City and ISO 3166 country code, e.g. "London, GB".
    pub location: String,
    pub units: Units,
    pub policy: ModePolicy,
    pub refresh: RefreshIntervals,
    pub timing: LoopTiming,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: "Los Angeles, US".to_string(),
            units: Units::Imperial,
            policy: ModePolicy::default(),
            refresh: RefreshIntervals::default(),
            timing: LoopTiming::default(),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be an hour between 0 and 23, got {value}")]
    InvalidHour { name: &'static str, value: u8 },

    #[error("weekend day must be between 0 (Mon) and 6 (Sun), got {0}")]
    InvalidWeekday(u8),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("location must not be empty")]
    EmptyLocation,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.policy;
        for (name, value) in [
            ("quiet_start", p.quiet_start),
            ("quiet_end", p.quiet_end),
            ("weekend_threshold", p.weekend_threshold),
            ("day_start", p.day_start),
        ] {
            if value > 23 {
                return Err(ConfigError::InvalidHour { name, value });
            }
        }
        // 24 is allowed: weather may be shown until midnight
        if p.night_cutoff > 24 {
            return Err(ConfigError::InvalidHour {
                name: "night_cutoff",
                value: p.night_cutoff,
            });
        }
        if let Some(&day) = p.weekend_days.iter().find(|&&d| d > 6) {
            return Err(ConfigError::InvalidWeekday(day));
        }
        if self.timing.frame_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("frame_duration"));
        }
        if self.timing.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll_interval"));
        }
        if self.location.trim().is_empty() {
            return Err(ConfigError::EmptyLocation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn defaults_validate() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[rstest]
    #[case(0, true)]
    #[case(5, true)]
    #[case(6, false)]
    #[case(12, false)]
    #[case(21, false)]
    #[case(22, true)]
    #[case(23, true)]
    fn default_quiet_window_wraps_midnight(#[case] hour: u8, #[case] quiet: bool) {
        assert_eq!(ModePolicy::default().is_quiet_hour(hour), quiet);
    }

    #[rstest]
    #[case(1, false)]
    #[case(2, true)]
    #[case(3, true)]
    #[case(4, false)]
    fn same_day_quiet_window(#[case] hour: u8, #[case] quiet: bool) {
        let policy = ModePolicy {
            quiet_start: 2,
            quiet_end: 4,
            ..ModePolicy::default()
        };
        assert_eq!(policy.is_quiet_hour(hour), quiet);
    }

    #[rstest]
    #[case(5, 9, true)]
    #[case(6, 9, true)]
    #[case(6, 10, false)]
    #[case(4, 9, false)]
    #[case(0, 7, false)]
    fn weekend_morning(#[case] weekday: u8, #[case] hour: u8, #[case] held: bool) {
        assert_eq!(ModePolicy::default().is_weekend_morning(weekday, hour), held);
    }

    #[test]
    fn rejects_out_of_range_hour() {
        let mut config = Config::default();
        config.policy.quiet_start = 24;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidHour {
                name: "quiet_start",
                value: 24
            })
        );
    }

    #[test]
    fn rejects_bad_weekday() {
        let mut config = Config::default();
        config.policy.weekend_days = vec![5, 7];
        assert_eq!(config.validate(), Err(ConfigError::InvalidWeekday(7)));
    }

    #[test]
    fn rejects_zero_frame_duration() {
        let mut config = Config::default();
        config.timing.frame_duration = Duration::ZERO;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("frame_duration"))
        );
    }

    #[test]
    fn rejects_blank_location() {
        let config = Config {
            location: "  ".to_string(),
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyLocation));
    }

    #[rstest]
    #[case(Units::Imperial, "imperial", "F")]
    #[case(Units::Metric, "metric", "C")]
    fn units_strings(#[case] units: Units, #[case] query: &str, #[case] suffix: &str) {
        assert_eq!(units.as_query(), query);
        assert_eq!(units.temperature_suffix(), suffix);
    }
}
