//! Motion-activated weather display for an RGB LED matrix.
//!
//! The crate is split into a testable decision core and the collaborators
//! it drives:
//! - [`refresh`]: TTL caches for local time and weather data
//! - [`mode`]: the display mode state machine (quiet hours, weekend hold,
//!   motion activation, sprite loop)
//! - [`controller`]: the main loop tying both together
//! - [`clock`], [`weather`], [`motion`], [`display`]: collaborator traits
//!   and their concrete implementations
//!
//! This module also holds the panel/color helpers shared by the renderers,
//! matrix initialization, and signal handling for clean shutdown.

pub mod clock;
pub mod config;
pub mod controller;
pub mod display;
pub mod mode;
pub mod motion;
pub mod refresh;
#[cfg(feature = "hardware")]
pub mod render;
pub mod server;
pub mod sprite;
pub mod weather;

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Panel configuration ────────────────────────────────────────────

/// Configuration for the LED panel dimensions.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two u32s).
/// Sprite sheets are sliced into frames of exactly `rows` pixels, so the
/// same value travels from the CLI to the sprite loader and the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }
}

impl Default for PanelConfig {
    /// A single 64x32 panel.
    fn default() -> Self {
        Self { rows: 32, cols: 64 }
    }
}

/// Wiring options passed to the matrix driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixWiring {
    /// Hardware mapping name understood by the driver (e.g. "adafruit-hat").
    pub hardware_mapping: String,
    /// GPIO slowdown; faster Pis need higher values.
    pub gpio_slowdown: u32,
}

impl Default for MatrixWiring {
    fn default() -> Self {
        Self {
            hardware_mapping: "adafruit-hat".to_string(),
            gpio_slowdown: 2,
        }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// This lets the sprite loader and the weather renderer share color logic
/// that is tested without `rpi-led-matrix`. At the hardware boundary, we
/// convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const AMBER: Color = Color::new(255, 160, 0);
    pub const SKY: Color = Color::new(60, 140, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Create a matrix for the given panel size and wiring.
///
/// # Rust concept: Result and the ? operator
/// Matrix initialization can fail (not running as root, GPIO unavailable),
/// so the caller gets a `Result` and decides whether to bail out.
#[cfg(feature = "hardware")]
pub fn create_matrix(
    panel: PanelConfig,
    wiring: &MatrixWiring,
) -> Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_hardware_mapping(&wiring.hardware_mapping);

    options.set_pwm_bits(8)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(wiring.gpio_slowdown);

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;

    Ok(matrix)
}

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The control thread polls the flag between ticks; the signal handler
/// runs on its own thread. `Arc` gives both of them a handle to the same
/// `AtomicBool`, no mutex needed for a single bool.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::error!("Error setting Ctrl-C handler: {}", e);
    }

    running
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
