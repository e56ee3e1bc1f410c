//! LED Matrix Weather Display
//!
//! Shows an idle sprite animation on an RGB LED matrix and switches to the
//! current weather when the motion sensor trips. The panel stays dark
//! during quiet hours and on weekend mornings.
//!
//! ## Architecture
//! - **Control thread** (std::thread): owns the matrix, the sensors and all
//!   controller state; ticks refresh -> mode -> render and sleeps
//! - **Status server** (tokio/axum, optional): serves the controller's
//!   status snapshot for diagnostics
//!
//! Built without the `hardware` feature the controller runs against a
//! headless display that only logs what it would show.
//!
//! ## Usage
//! ```sh
//! OPENWEATHER_TOKEN=... sudo -E ./target/release/matrix-weather \
//!     --location "London, GB" --units metric --sprite-sheet bmps/santa.bmp --status-port 8080
//! ```

use clap::Parser;
use matrix_weather::clock::SystemClock;
use matrix_weather::config::{Config, LoopTiming, ModePolicy, RefreshIntervals, Units};
use matrix_weather::controller::{Controller, ControllerStatus};
use matrix_weather::motion::SysfsMotionSensor;
use matrix_weather::server::{self, AppState};
use matrix_weather::sprite::SpriteSheet;
use matrix_weather::weather::{DEFAULT_BASE_URL, OpenWeatherFeed};
use matrix_weather::{PanelConfig, setup_signal_handler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// LED Matrix Weather Display
#[derive(Parser, Debug)]
#[cfg_attr(not(feature = "hardware"), allow(dead_code))]
#[command(name = "matrix-weather")]
#[command(about = "Motion-activated weather display for an RGB LED matrix")]
#[command(version)]
struct Args {
    /// City and ISO 3166 country code, e.g. "London, GB"
    #[arg(long, env = "MATRIX_WEATHER_LOCATION", default_value = "Los Angeles, US")]
    location: String,

    /// Units for temperature and wind speed
    #[arg(long, env = "MATRIX_WEATHER_UNITS", value_enum, default_value_t = Units::Imperial)]
    units: Units,

    /// OpenWeatherMap API token
    #[arg(long, env = "OPENWEATHER_TOKEN", hide_env_values = true)]
    openweather_token: String,

    /// Base URL of the OpenWeatherMap API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    api_base_url: String,

    /// Vertical sprite sheet; frames are one panel high
    #[arg(long, default_value = "bmps/santa.bmp")]
    sprite_sheet: PathBuf,

    /// Path to BDF font directory
    #[arg(long, default_value = "fonts/bdf")]
    fonts_dir: PathBuf,

    /// BDF font name used for the weather lines
    #[arg(long, default_value = "6x13")]
    font: String,

    /// Number of rows on the LED panel
    #[arg(long, default_value = "32")]
    rows: u32,

    /// Number of columns on the LED panel
    #[arg(long, default_value = "64")]
    cols: u32,

    /// Driver hardware mapping
    #[arg(long, default_value = "adafruit-hat")]
    hardware_mapping: String,

    /// GPIO slowdown (Pi Zero 2 W needs 2)
    #[arg(long, default_value = "2")]
    gpio_slowdown: u32,

    /// Display brightness (0-100)
    #[arg(long, default_value = "75")]
    brightness: u8,

    /// Sysfs node holding the motion sensor's raw ADC value
    #[arg(long, default_value = "/sys/bus/iio/devices/iio:device0/in_voltage0_raw")]
    motion_sensor: PathBuf,

    /// Raw motion level above which the weather is shown
    #[arg(long, default_value = "1000")]
    motion_threshold: u16,

    /// Seconds the weather stays up after a motion trigger
    #[arg(long, default_value = "60")]
    active_window_secs: u64,

    /// First dark hour of the night
    #[arg(long, default_value = "22")]
    quiet_start: u8,

    /// First lit hour of the morning
    #[arg(long, default_value = "6")]
    quiet_end: u8,

    /// Weekdays with a dark morning (0 = Mon ... 6 = Sun)
    #[arg(long, value_delimiter = ',', default_value = "5,6")]
    weekend_days: Vec<u8>,

    /// Weekend mornings stay dark before this hour
    #[arg(long, default_value = "10")]
    weekend_threshold: u8,

    /// Idle sprite loop starts at this hour
    #[arg(long, default_value = "7")]
    day_start: u8,

    /// Weather is not shown from this hour on
    #[arg(long, default_value = "22")]
    night_cutoff: u8,

    /// Seconds between local time syncs
    #[arg(long, default_value = "3600")]
    time_sync_secs: u64,

    /// Seconds between weather fetches
    #[arg(long, default_value = "600")]
    weather_sync_secs: u64,

    /// Milliseconds each sprite frame is shown
    #[arg(long, default_value = "200")]
    frame_duration_ms: u64,

    /// Milliseconds between ticks when not animating
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Milliseconds each weather label is held
    #[arg(long, default_value = "2000")]
    scroll_hold_ms: u64,

    /// Weather request timeout in seconds
    #[arg(long, default_value = "10")]
    fetch_timeout_secs: u64,

    /// Seconds to wait after a failed weather request before trying again
    #[arg(long, default_value = "5")]
    retry_cooldown_secs: u64,

    /// Serve the status API on this port
    #[arg(long)]
    status_port: Option<u16>,
}

impl Args {
    fn panel(&self) -> PanelConfig {
        PanelConfig::new(self.rows, self.cols)
    }

    fn config(&self) -> Config {
        Config {
            location: self.location.clone(),
            units: self.units,
            policy: ModePolicy {
                quiet_start: self.quiet_start,
                quiet_end: self.quiet_end,
                weekend_days: self.weekend_days.clone(),
                weekend_threshold: self.weekend_threshold,
                day_start: self.day_start,
                night_cutoff: self.night_cutoff,
                motion_threshold: self.motion_threshold,
                active_window: Duration::from_secs(self.active_window_secs),
                frame_count: 1,
            },
            refresh: RefreshIntervals {
                time_sync: Duration::from_secs(self.time_sync_secs),
                weather_sync: Duration::from_secs(self.weather_sync_secs),
            },
            timing: LoopTiming {
                frame_duration: Duration::from_millis(self.frame_duration_ms),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                scroll_hold: Duration::from_millis(self.scroll_hold_ms),
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let config = args.config();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("LED Matrix Weather v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", args.cols, args.rows);
    tracing::info!("Weather for {} ({})", config.location, config.units.as_query());

    let running = setup_signal_handler();
    let status = Arc::new(Mutex::new(ControllerStatus::new()));

    // Dropped when the control thread ends, which stops the status server.
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

    let status_port = args.status_port;
    let control_status = status.clone();
    let control_handle = std::thread::spawn(move || {
        let _done = done_tx;
        match run_control(&args, config, control_status, &running) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Controller failed: {}", e);
                false
            }
        }
    });

    if let Some(port) = status_port {
        let app = server::create_router(AppState { status });
        let addr = format!("0.0.0.0:{port}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                tracing::info!("Status API on http://{}/api/v1/status", addr);
                let shutdown = async move {
                    let _ = done_rx.await;
                };
                if let Err(e) = axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
                {
                    tracing::error!("Status server error: {}", e);
                }
            }
            Err(e) => {
                // Keep the display running without the API
                tracing::error!("Failed to bind {}: {}", addr, e);
                let _ = done_rx.await;
            }
        }
    } else {
        let _ = done_rx.await;
    }

    match control_handle.join() {
        Ok(true) => {
            tracing::info!("Shut down cleanly.");
            ExitCode::SUCCESS
        }
        _ => ExitCode::FAILURE,
    }
}

/// Build the collaborators on the control thread and run until shutdown.
fn run_control(
    args: &Args,
    mut config: Config,
    status: Arc<Mutex<ControllerStatus>>,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let panel = args.panel();

    let feed = OpenWeatherFeed::new(
        args.api_base_url.as_str(),
        args.openweather_token.as_str(),
        Duration::from_secs(args.fetch_timeout_secs),
        Duration::from_secs(args.retry_cooldown_secs),
    )?;
    let motion = SysfsMotionSensor::new(&args.motion_sensor);

    #[cfg(feature = "hardware")]
    let display = {
        let sprites = SpriteSheet::load(&args.sprite_sheet, panel, args.brightness)?;
        config.policy.frame_count = sprites.frame_count();
        let font_path = args.fonts_dir.join(format!("{}.bdf", args.font));
        let wiring = matrix_weather::MatrixWiring {
            hardware_mapping: args.hardware_mapping.clone(),
            gpio_slowdown: args.gpio_slowdown,
        };
        matrix_weather::render::MatrixDisplay::new(panel, &wiring, sprites, &font_path, args.brightness)?
    };

    #[cfg(not(feature = "hardware"))]
    let display = {
        match SpriteSheet::load(&args.sprite_sheet, panel, args.brightness) {
            Ok(sprites) => config.policy.frame_count = sprites.frame_count(),
            Err(e) => tracing::warn!("No sprite sheet ({}), animating a single frame", e),
        }
        tracing::info!("Built without the 'hardware' feature, using a headless display");
        matrix_weather::display::HeadlessDisplay::new()
    };

    tracing::info!("Sprite loop: {} frames", config.policy.frame_count);

    let mut controller = Controller::new(config, SystemClock, feed, motion, display).with_status(status);
    controller.run(running);
    Ok(())
}
