//! Main loop: refresh, decide, render, sleep.
//!
//! The controller owns every piece of mutable state (refresh caches, mode
//! state, collaborators, the display) and runs on a single thread. The only
//! thing it shares is a [`ControllerStatus`] snapshot that the status API
//! reads.
//!
//! ## Rust concepts
//! - Generic struct over collaborator traits (static dispatch, easy fakes)
//! - Disjoint field borrows: the refresh outcome borrows `scheduler` while
//!   `modes` and `motion` are used mutably
//! - `Arc<Mutex<T>>` for the one value another thread reads

use crate::clock::{ClockReading, ClockSource};
use crate::config::{Config, LoopTiming};
use crate::display::DisplaySurface;
use crate::is_running;
use crate::mode::{DisplayMode, ModeController, ModeInputs, ModeKind};
use crate::motion::MotionSensor;
use crate::refresh::{RefreshScheduler, RefreshState};
use crate::weather::{WeatherFeed, WeatherReading};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Weather appears as a summary line, then a detail line.
const WEATHER_SCROLL_STEPS: usize = 2;

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of the controller, refreshed once per tick.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ControllerStatus {
    /// What the panel is showing
    pub mode: ModeKind,
    /// Sprite frame on screen (sprite loop only)
    pub frame: Option<usize>,
    /// Whether a motion trigger is holding the weather up
    pub active: bool,
    /// Best-known local time
    pub clock: Option<ClockReading>,
    /// Last raw motion sample
    pub motion_level: Option<u16>,
    /// Cached weather reading
    pub weather: Option<WeatherReading>,
    /// Seconds since the last successful time sync
    pub secs_since_time_sync: Option<u64>,
    /// Seconds since the last successful weather fetch
    pub secs_since_weather_sync: Option<u64>,
    /// Sync failure from the most recent tick
    pub failure: Option<String>,
    /// Ticks since start
    pub ticks: u64,
    /// Controller version
    pub version: String,
}

impl ControllerStatus {
    pub fn new() -> Self {
        Self {
            mode: ModeKind::Blank,
            frame: None,
            active: false,
            clock: None,
            motion_level: None,
            weather: None,
            secs_since_time_sync: None,
            secs_since_weather_sync: None,
            failure: None,
            ticks: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self::new()
    }
}

// ── Controller ───────────────────────────────────────────────────────

pub struct Controller<C, W, M, D> {
    timing: LoopTiming,
    scheduler: RefreshScheduler,
    modes: ModeController,
    clock: C,
    feed: W,
    motion: M,
    display: D,
    /// Kind of the last mode handed to the display.
    shown: Option<ModeKind>,
    status: Arc<Mutex<ControllerStatus>>,
    ticks: u64,
}

impl<C, W, M, D> Controller<C, W, M, D>
where
    C: ClockSource,
    W: WeatherFeed,
    M: MotionSensor,
    D: DisplaySurface,
{
    pub fn new(config: Config, clock: C, feed: W, motion: M, display: D) -> Self {
        Self {
            timing: config.timing,
            scheduler: RefreshScheduler::new(config.refresh, config.location, config.units),
            modes: ModeController::new(config.policy),
            clock,
            feed,
            motion,
            display,
            shown: None,
            status: Arc::new(Mutex::new(ControllerStatus::new())),
            ticks: 0,
        }
    }

    /// Publish into an existing snapshot, e.g. one the HTTP server already holds.
    pub fn with_status(mut self, status: Arc<Mutex<ControllerStatus>>) -> Self {
        self.status = status;
        self
    }

    /// Handle for readers on other threads.
    pub fn status(&self) -> Arc<Mutex<ControllerStatus>> {
        self.status.clone()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn modes(&self) -> &ModeController {
        &self.modes
    }

    pub fn refresh_state(&self) -> &RefreshState {
        self.scheduler.state()
    }

    /// Run one iteration and return how long to sleep before the next.
    ///
    /// `now` is monotonic time since the loop started.
    pub fn tick(&mut self, now: Duration) -> Duration {
        self.ticks += 1;

        let outcome = self.scheduler.tick(now, &mut self.clock, &mut self.feed);
        let clock = outcome.clock;

        let failure = outcome.failure.map(|f| (f.is_fresh(), f.to_string()));

        if let Some((true, failure)) = failure {
            // Quiet hours still apply on the last known clock; anything else waits
            match self.modes.hold(clock) {
                Some(mode) => {
                    self.render(&mode);
                    self.publish(now, clock, None, Some(&mode), Some(failure));
                }
                None => {
                    // Nothing on screen yet means we just booted: stay dark
                    if self.shown.is_none() {
                        self.blank();
                    }
                    self.publish(now, clock, None, None, Some(failure));
                }
            }
            return self.timing.poll_interval;
        }

        let motion_level = self.motion.read();
        let mode = self.modes.tick(&ModeInputs {
            clock,
            motion_level,
            weather: outcome.weather,
            now,
        });

        self.render(&mode);
        self.publish(
            now,
            clock,
            Some(motion_level),
            Some(&mode),
            failure.map(|(_, failure)| failure),
        );

        match mode {
            DisplayMode::SpriteLoop { .. } => self.timing.frame_duration,
            _ => self.timing.poll_interval,
        }
    }

    /// Tick until `running` is cleared, then leave the panel dark.
    pub fn run(&mut self, running: &AtomicBool) {
        let start = Instant::now();
        self.blank();
        tracing::info!("Control loop started");

        while is_running(running) {
            let pause = self.tick(start.elapsed());
            thread::sleep(pause);
        }

        tracing::info!("Control loop stopping, blanking display");
        self.blank();
    }

    pub fn blank(&mut self) {
        self.display.show(&DisplayMode::Blank);
        self.shown = Some(ModeKind::Blank);
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mode = ModeKind::Blank;
    }

    fn render(&mut self, mode: &DisplayMode) {
        let kind = mode.kind();
        if self.shown != Some(kind) {
            tracing::info!("Mode: {:?} -> {:?}", self.shown.unwrap_or(ModeKind::Blank), kind);
        }

        self.display.show(mode);

        // Only a transition into weather runs the label sequence
        if kind == ModeKind::WeatherDisplay && self.shown != Some(ModeKind::WeatherDisplay) {
            for _ in 0..WEATHER_SCROLL_STEPS {
                self.display.scroll_next_label();
                if !self.timing.scroll_hold.is_zero() {
                    thread::sleep(self.timing.scroll_hold);
                }
            }
        }

        self.shown = Some(kind);
    }

    fn publish(
        &self,
        now: Duration,
        clock: Option<ClockReading>,
        motion_level: Option<u16>,
        mode: Option<&DisplayMode>,
        failure: Option<String>,
    ) {
        let state = self.scheduler.state();
        let since = |at: Option<Duration>| at.map(|t| now.saturating_sub(t).as_secs());

        let mut s = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mode) = mode {
            s.mode = mode.kind();
            s.frame = match mode {
                DisplayMode::SpriteLoop { frame_index } => Some(*frame_index),
                _ => None,
            };
        }
        if motion_level.is_some() {
            s.motion_level = motion_level;
        }
        s.active = self.modes.is_active();
        s.clock = clock;
        if s.weather.as_ref() != state.cached_weather.as_ref() {
            s.weather = state.cached_weather.clone();
        }
        s.secs_since_time_sync = since(state.last_time_sync);
        s.secs_since_weather_sync = since(state.last_weather_sync);
        s.failure = failure;
        s.ticks = self.ticks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockError;
    use crate::config::{ModePolicy, Units};
    use crate::display::HeadlessDisplay;
    use crate::weather::FetchError;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    // ── Fakes ────────────────────────────────────────────────────────

    /// Fails until `fail_first` calls have been made, then reports `reading`.
    struct FakeClock {
        reading: ClockReading,
        fail_first: usize,
        calls: usize,
    }

    impl FakeClock {
        fn at(hour: u8, weekday: u8) -> Self {
            Self {
                reading: ClockReading::new(hour, 0, weekday),
                fail_first: 0,
                calls: 0,
            }
        }
    }

    impl ClockSource for FakeClock {
        fn now_local(&mut self) -> Result<ClockReading, ClockError> {
            self.calls += 1;
            if self.calls <= self.fail_first {
                Err(ClockError::Unavailable("no network".into()))
            } else {
                Ok(self.reading)
            }
        }
    }

    #[derive(Default)]
    struct FakeFeed {
        script: VecDeque<Result<WeatherReading, FetchError>>,
    }

    impl FakeFeed {
        fn with(results: Vec<Result<WeatherReading, FetchError>>) -> Self {
            Self {
                script: results.into(),
            }
        }
    }

    impl WeatherFeed for FakeFeed {
        fn fetch(&mut self, _location: &str, _units: Units) -> Result<WeatherReading, FetchError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Status(503)))
        }
    }

    /// Replays samples, then reads 0.
    #[derive(Default)]
    struct FakeMotion(VecDeque<u16>);

    impl MotionSensor for FakeMotion {
        fn read(&mut self) -> u16 {
            self.0.pop_front().unwrap_or(0)
        }
    }

    /// Records every call, including repeats.
    #[derive(Default)]
    struct RecordingDisplay {
        shows: Vec<DisplayMode>,
        scrolls: usize,
    }

    impl DisplaySurface for RecordingDisplay {
        fn show(&mut self, mode: &DisplayMode) {
            self.shows.push(mode.clone());
        }

        fn scroll_next_label(&mut self) {
            self.scrolls += 1;
        }
    }

    fn reading(temperature: f32) -> WeatherReading {
        WeatherReading {
            location: "Los Angeles".to_string(),
            condition: "Clouds".to_string(),
            description: "few clouds".to_string(),
            temperature,
            feels_like: temperature,
            humidity: 40,
            wind_speed: 2.0,
            units: Units::Imperial,
        }
    }

    fn config() -> Config {
        Config {
            policy: ModePolicy {
                frame_count: 3,
                ..ModePolicy::default()
            },
            timing: LoopTiming {
                scroll_hold: Duration::ZERO,
                ..LoopTiming::default()
            },
            ..Config::default()
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    type TestController = Controller<FakeClock, FakeFeed, FakeMotion, RecordingDisplay>;

    fn controller(clock: FakeClock, feed: FakeFeed, motion: Vec<u16>) -> TestController {
        Controller::new(
            config(),
            clock,
            feed,
            FakeMotion(motion.into()),
            RecordingDisplay::default(),
        )
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[test]
    fn boot_to_sprites_to_weather() {
        let mut clock = FakeClock::at(8, 2);
        clock.fail_first = 1;
        let feed = FakeFeed::with(vec![Ok(reading(70.0))]);
        let mut ctl = controller(clock, feed, vec![0, 2000, 0]);

        // Time server unreachable: dark
        assert_eq!(ctl.tick(secs(0)), Duration::from_millis(100));
        assert_eq!(ctl.display().shows, vec![DisplayMode::Blank]);

        // Synced, idle daytime: first sprite frame
        assert_eq!(ctl.tick(secs(1)), Duration::from_millis(200));
        assert_eq!(
            ctl.display().shows.last(),
            Some(&DisplayMode::SpriteLoop { frame_index: 0 })
        );

        // Motion: weather with the two-label sequence
        assert_eq!(ctl.tick(secs(2)), Duration::from_millis(100));
        assert!(ctl.modes().is_active());
        assert_eq!(
            ctl.display().shows.last(),
            Some(&DisplayMode::WeatherDisplay {
                reading: reading(70.0)
            })
        );
        assert_eq!(ctl.display().scrolls, 2);

        // Still active: weather stays up without another scroll sequence
        ctl.tick(secs(3));
        assert_eq!(ctl.display().scrolls, 2);
        assert!(matches!(
            ctl.display().shows.last(),
            Some(DisplayMode::WeatherDisplay { .. })
        ));
    }

    #[test]
    fn weather_window_closes_back_to_sprites() {
        let feed = FakeFeed::with(vec![Ok(reading(70.0))]);
        let mut ctl = controller(FakeClock::at(9, 0), feed, vec![5000]);

        ctl.tick(secs(0));
        assert!(ctl.modes().is_active());

        ctl.tick(secs(61));
        assert!(!ctl.modes().is_active());
        assert_eq!(
            ctl.display().shows.last(),
            Some(&DisplayMode::SpriteLoop { frame_index: 0 })
        );
    }

    #[test]
    fn failed_fetch_keeps_reporting_cached_weather() {
        let feed = FakeFeed::with(vec![Ok(reading(70.0)), Err(FetchError::Status(500))]);
        let mut ctl = controller(FakeClock::at(12, 1), feed, vec![]);

        ctl.tick(secs(0));
        let shows_before = ctl.display().shows.len();

        // Due again, fails: no mode processing this tick
        assert_eq!(ctl.tick(secs(601)), Duration::from_millis(100));
        assert_eq!(ctl.display().shows.len(), shows_before);
        assert_eq!(ctl.refresh_state().cached_weather, Some(reading(70.0)));

        let status = ctl.status();
        let status = status.lock().unwrap();
        assert_eq!(status.weather, Some(reading(70.0)));
        assert!(status.failure.as_deref().unwrap().starts_with("weather fetch failed"));
        assert_eq!(status.secs_since_weather_sync, Some(601));
    }

    #[test]
    fn outage_still_goes_dark_at_quiet_hours() {
        let mut clock = FakeClock::at(21, 1);
        clock.reading = ClockReading::new(21, 30, 1);
        let feed = FakeFeed::with(vec![Ok(reading(70.0))]);
        let mut ctl = controller(clock, feed, vec![]);

        ctl.tick(secs(0));
        assert_eq!(
            ctl.display().shows.last(),
            Some(&DisplayMode::SpriteLoop { frame_index: 0 })
        );

        // 22:05 on the advanced clock, weather overdue and failing
        assert_eq!(ctl.tick(secs(2100)), Duration::from_millis(100));
        assert_eq!(ctl.display().shows.last(), Some(&DisplayMode::Blank));

        let status = ctl.status().lock().unwrap().clone();
        assert_eq!(status.mode, ModeKind::Blank);
        assert_eq!(status.clock, Some(ClockReading::new(22, 5, 1)));
        assert!(status.failure.is_some());
    }

    #[test]
    fn deferred_fetch_still_closes_the_weather_window() {
        let feed = FakeFeed::with(vec![
            Ok(reading(70.0)),
            Err(FetchError::Status(503)),
            Err(FetchError::CoolingDown(Duration::from_secs(4))),
        ]);
        let mut ctl = controller(FakeClock::at(12, 1), feed, vec![3000]);

        ctl.tick(secs(0));
        assert!(ctl.modes().is_active());

        // Fresh failure: display left alone
        ctl.tick(secs(601));
        assert!(ctl.modes().is_active());

        // Backing off: the rules run on cached weather and the window closes
        assert_eq!(ctl.tick(secs(602)), Duration::from_millis(200));
        assert!(!ctl.modes().is_active());
        assert_eq!(
            ctl.display().shows.last(),
            Some(&DisplayMode::SpriteLoop { frame_index: 0 })
        );
        let status = ctl.status().lock().unwrap().clone();
        assert!(status.failure.as_deref().unwrap().starts_with("weather fetch deferred"));
    }

    #[test]
    fn quiet_hours_stay_dark_with_motion() {
        let feed = FakeFeed::with(vec![Ok(reading(55.0))]);
        let mut ctl = controller(FakeClock::at(23, 1), feed, vec![4000, 4000]);

        assert_eq!(ctl.tick(secs(0)), Duration::from_millis(100));
        ctl.tick(secs(1));
        assert!(ctl.display().shows.iter().all(|m| *m == DisplayMode::Blank));
        assert!(!ctl.modes().is_active());
    }

    #[test]
    fn sprite_frames_advance_per_tick() {
        let feed = FakeFeed::with(vec![Ok(reading(70.0))]);
        let mut ctl = controller(FakeClock::at(14, 3), feed, vec![]);

        for s in 0..4 {
            ctl.tick(secs(s));
        }
        let frames: Vec<usize> = ctl
            .display()
            .shows
            .iter()
            .filter_map(|m| match m {
                DisplayMode::SpriteLoop { frame_index } => Some(*frame_index),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![0, 1, 2, 0]);
    }

    #[test]
    fn status_snapshot_tracks_tick() {
        let feed = FakeFeed::with(vec![Ok(reading(70.0))]);
        let mut ctl = controller(FakeClock::at(14, 3), feed, vec![321]);

        ctl.tick(secs(5));
        let status = ctl.status().lock().unwrap().clone();
        assert_eq!(status.mode, ModeKind::SpriteLoop);
        assert_eq!(status.frame, Some(0));
        assert_eq!(status.motion_level, Some(321));
        assert_eq!(status.clock, Some(ClockReading::new(14, 0, 3)));
        assert_eq!(status.secs_since_time_sync, Some(0));
        assert_eq!(status.failure, None);
        assert_eq!(status.ticks, 1);
    }

    #[test]
    fn run_blanks_on_exit() {
        let feed = FakeFeed::with(vec![Ok(reading(70.0))]);
        let mut ctl = Controller::new(
            config(),
            FakeClock::at(14, 3),
            feed,
            FakeMotion::default(),
            HeadlessDisplay::new(),
        );
        let running = AtomicBool::new(false);

        ctl.run(&running);
        assert_eq!(ctl.display().current(), Some(&DisplayMode::Blank));
    }
}
