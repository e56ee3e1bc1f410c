//! Refresh scheduler: two independent pull caches with a TTL.
//!
//! Local time is re-synced hourly and weather every ten minutes (by
//! default). A failed sync never evicts what we already have: a stale
//! reading on the panel beats a blank one. There is no retry loop here;
//! the main loop's tick cadence is the retry.

use crate::clock::{ClockReading, ClockSource};
use crate::config::{RefreshIntervals, Units};
use crate::weather::{FetchError, WeatherFeed, WeatherReading};
use std::time::Duration;
use thiserror::Error;

/// Cache bookkeeping. Timestamps are monotonic time since controller start.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshState {
    pub last_time_sync: Option<Duration>,
    pub last_weather_sync: Option<Duration>,
    /// Most recent successful fetch, never overwritten by a failure.
    pub cached_weather: Option<WeatherReading>,
}

/// Why this tick's sync was cut short.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("time sync failed: {0}")]
    TimeSync(String),

    #[error("weather fetch failed: {0}")]
    WeatherFetch(String),

    /// No request went out: the feed is still backing off from an earlier failure.
    #[error("weather fetch deferred: {0}")]
    WeatherDeferred(String),
}

impl SyncFailure {
    /// Whether this tick made a sync attempt that failed. Such a tick skips
    /// everything after the hold rules.
    pub fn is_fresh(&self) -> bool {
        !matches!(self, SyncFailure::WeatherDeferred(_))
    }
}

/// Result of one scheduler tick.
#[derive(Debug)]
pub struct RefreshOutcome<'a> {
    /// Best-known local time, `None` until the first successful sync.
    pub clock: Option<ClockReading>,
    /// Cached weather, reported even when this tick's fetch failed.
    pub weather: Option<&'a WeatherReading>,
    pub failure: Option<SyncFailure>,
}

pub struct RefreshScheduler {
    intervals: RefreshIntervals,
    location: String,
    units: Units,
    state: RefreshState,
    synced_clock: Option<ClockReading>,
}

impl RefreshScheduler {
    pub fn new(intervals: RefreshIntervals, location: impl Into<String>, units: Units) -> Self {
        Self {
            intervals,
            location: location.into(),
            units,
            state: RefreshState::default(),
            synced_clock: None,
        }
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    /// The last synced reading, advanced by the time elapsed since the sync.
    pub fn best_known_clock(&self, now: Duration) -> Option<ClockReading> {
        let reading = self.synced_clock?;
        let synced_at = self.state.last_time_sync.unwrap_or(now);
        Some(reading.advanced_by(now.saturating_sub(synced_at)))
    }

    pub fn tick<C, W>(&mut self, now: Duration, clock: &mut C, feed: &mut W) -> RefreshOutcome<'_>
    where
        C: ClockSource,
        W: WeatherFeed,
    {
        let failure = self.sync(now, clock, feed).err();
        RefreshOutcome {
            clock: self.best_known_clock(now),
            weather: self.state.cached_weather.as_ref(),
            failure,
        }
    }

    fn sync<C, W>(&mut self, now: Duration, clock: &mut C, feed: &mut W) -> Result<(), SyncFailure>
    where
        C: ClockSource,
        W: WeatherFeed,
    {
        if is_due(self.state.last_time_sync, now, self.intervals.time_sync) {
            tracing::debug!("Getting local time");
            match clock.now_local() {
                Ok(reading) => {
                    tracing::info!(
                        "Local time synced: {:02}:{:02} (weekday {})",
                        reading.hour,
                        reading.minute,
                        reading.weekday
                    );
                    self.synced_clock = Some(reading);
                    self.state.last_time_sync = Some(now);
                }
                Err(e) => {
                    tracing::warn!("Time sync failed, retrying next tick: {}", e);
                    return Err(SyncFailure::TimeSync(e.to_string()));
                }
            }
        }

        if is_due(self.state.last_weather_sync, now, self.intervals.weather_sync) {
            tracing::debug!("Fetching weather for {}", self.location);
            match feed.fetch(&self.location, self.units) {
                Ok(reading) => {
                    tracing::info!(
                        "Weather for {}: {} {}",
                        self.location,
                        reading.temperature_label(),
                        reading.description
                    );
                    self.state.cached_weather = Some(reading);
                    self.state.last_weather_sync = Some(now);
                }
                Err(e @ FetchError::CoolingDown(_)) => {
                    tracing::debug!("Weather fetch skipped: {}", e);
                    return Err(SyncFailure::WeatherDeferred(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!("Weather fetch failed, retrying next tick: {}", e);
                    return Err(SyncFailure::WeatherFetch(e.to_string()));
                }
            }
        }

        Ok(())
    }
}

fn is_due(last: Option<Duration>, now: Duration, interval: Duration) -> bool {
    match last {
        None => true,
        Some(at) => now.saturating_sub(at) > interval,
    }
}
