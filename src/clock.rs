//! Local time of day: the reading the mode policy works on, and where it comes from.

use chrono::{Datelike, Local, Timelike};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const SECS_PER_DAY: u64 = 24 * 3600;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;

/// Anything before this Unix timestamp (2001-09-09) means the clock was never set.
const EARLIEST_PLAUSIBLE_TIMESTAMP: i64 = 1_000_000_000;

/// Local wall-clock time, reduced to what the display policy needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ClockReading {
    /// 0-23
    pub hour: u8,
    /// 0-59
    pub minute: u8,
    /// 0-59
    pub second: u8,
    /// 0-6, Monday = 0
    pub weekday: u8,
}

impl ClockReading {
    pub fn new(hour: u8, minute: u8, weekday: u8) -> Self {
        Self {
            hour,
            minute,
            second: 0,
            weekday,
        }
    }

    pub fn with_second(self, second: u8) -> Self {
        Self { second, ..self }
    }

    fn second_of_week(&self) -> u64 {
        self.weekday as u64 * SECS_PER_DAY
            + self.hour as u64 * 3600
            + self.minute as u64 * 60
            + self.second as u64
    }

    /// The reading `elapsed` later, rolling over minutes, hours, days and the week.
    ///
    /// Sub-second parts of `elapsed` are dropped.
    pub fn advanced_by(&self, elapsed: Duration) -> Self {
        let secs = (self.second_of_week() + elapsed.as_secs() % SECS_PER_WEEK) % SECS_PER_WEEK;
        let of_day = secs % SECS_PER_DAY;
        Self {
            hour: (of_day / 3600) as u8,
            minute: (of_day % 3600 / 60) as u8,
            second: (of_day % 60) as u8,
            weekday: (secs / SECS_PER_DAY) as u8,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClockError {
    #[error("system clock not synchronized (timestamp {0})")]
    NotSynchronized(i64),

    #[error("time source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the current local time. Allowed to fail when no time server is reachable.
pub trait ClockSource {
    fn now_local(&mut self) -> Result<ClockReading, ClockError>;
}

/// Reads the host's local time.
///
/// On a Pi the system clock is set by NTP after the network comes up;
/// until then it sits near the epoch and we report it as not synchronized
/// rather than showing the wrong part of the day.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_local(&mut self) -> Result<ClockReading, ClockError> {
        let now = Local::now();
        if now.timestamp() < EARLIEST_PLAUSIBLE_TIMESTAMP {
            return Err(ClockError::NotSynchronized(now.timestamp()));
        }
        Ok(ClockReading {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            weekday: now.weekday().num_days_from_monday() as u8,
        })
    }
}
