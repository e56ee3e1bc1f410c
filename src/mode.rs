//! Display mode state machine.
//!
//! Every tick the controller feeds in the best-known local time, the motion
//! level, and the cached weather; the state machine answers with what the
//! panel should show. Rules are checked in strict priority order:
//!
//! 1. quiet hours (or unknown time) -> blank, state reset
//! 2. weekend morning hold -> blank, state reset
//! 3. motion above threshold activates the weather window
//! 4. the window closes after `active_window`
//! 5. active -> weather (sprites if nothing cached yet); idle daytime ->
//!    next sprite frame; otherwise blank
//!
//! ## Rust concepts
//! - `enum` with data variants for the output mode
//! - `let ... else` for early returns on missing input
//! - borrowing the cached reading in, cloning only when it is shown

use crate::clock::ClockReading;
use crate::config::ModePolicy;
use crate::weather::WeatherReading;
use std::time::Duration;

/// What the panel shows for one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayMode {
    Blank,
    SpriteLoop { frame_index: usize },
    WeatherDisplay { reading: WeatherReading },
}

impl DisplayMode {
    /// Short name for logs and the status API.
    pub fn kind(&self) -> ModeKind {
        match self {
            DisplayMode::Blank => ModeKind::Blank,
            DisplayMode::SpriteLoop { .. } => ModeKind::SpriteLoop,
            DisplayMode::WeatherDisplay { .. } => ModeKind::WeatherDisplay,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Blank,
    SpriteLoop,
    WeatherDisplay,
}

/// Per-tick inputs. `now` is monotonic time since the controller started.
#[derive(Clone, Copy, Debug)]
pub struct ModeInputs<'a> {
    pub clock: Option<ClockReading>,
    pub motion_level: u16,
    pub weather: Option<&'a WeatherReading>,
    pub now: Duration,
}

pub struct ModeController {
    policy: ModePolicy,
    active: bool,
    activation_time: Option<Duration>,
    current_frame: usize,
}

impl ModeController {
    pub fn new(policy: ModePolicy) -> Self {
        Self {
            policy,
            active: false,
            activation_time: None,
            current_frame: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activation_time(&self) -> Option<Duration> {
        self.activation_time
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Rules 1 and 2: `Some(Blank)` with the state reset when the panel must
    /// be dark whatever else is going on, `None` otherwise.
    ///
    /// Also runs on ticks whose sync failed, so an outage cannot keep the
    /// panel lit through quiet hours.
    pub fn hold(&mut self, clock: Option<ClockReading>) -> Option<DisplayMode> {
        // No time yet: stay dark until the first successful sync
        let Some(clock) = clock else {
            self.reset();
            return Some(DisplayMode::Blank);
        };

        if self.policy.is_quiet_hour(clock.hour) {
            if self.active {
                tracing::info!("Quiet hours began at {:02}:{:02}", clock.hour, clock.minute);
            }
            self.reset();
            return Some(DisplayMode::Blank);
        }

        if self.policy.is_weekend_morning(clock.weekday, clock.hour) {
            self.reset();
            return Some(DisplayMode::Blank);
        }

        None
    }

    pub fn tick(&mut self, inputs: &ModeInputs<'_>) -> DisplayMode {
        if let Some(mode) = self.hold(inputs.clock) {
            return mode;
        }
        let Some(clock) = inputs.clock else {
            return DisplayMode::Blank;
        };

        if !self.active && inputs.motion_level > self.policy.motion_threshold {
            tracing::info!(
                "Motion {} > {}, showing weather",
                inputs.motion_level,
                self.policy.motion_threshold
            );
            self.active = true;
            self.activation_time = Some(inputs.now);
            self.current_frame = 0;
        }

        if self.active {
            let since = self.activation_time.unwrap_or(inputs.now);
            if inputs.now.saturating_sub(since) > self.policy.active_window {
                tracing::info!("Activation window of {:?} elapsed", self.policy.active_window);
                self.active = false;
                self.activation_time = None;
            }
        }

        if self.active && clock.hour < self.policy.night_cutoff {
            return match inputs.weather {
                Some(reading) => DisplayMode::WeatherDisplay {
                    reading: reading.clone(),
                },
                None => {
                    tracing::debug!("No weather cached, falling back to sprites");
                    self.next_sprite()
                }
            };
        }

        if clock.hour >= self.policy.day_start {
            return self.next_sprite();
        }

        DisplayMode::Blank
    }

    /// Mode for the current frame, then step the frame counter.
    fn next_sprite(&mut self) -> DisplayMode {
        let frame_count = self.policy.frame_count.max(1);
        let frame_index = self.current_frame % frame_count;
        self.current_frame = (frame_index + 1) % frame_count;
        DisplayMode::SpriteLoop { frame_index }
    }

    fn reset(&mut self) {
        self.active = false;
        self.activation_time = None;
        self.current_frame = 0;
    }
}
