//! Hardware display surface: owns the LED matrix and draws each mode.
//!
//! The `rpi-led-matrix` C library is not thread-safe, so the matrix is
//! created and driven from the control thread only. Drawing goes to one
//! offscreen canvas that is swapped onto the panel (double buffering).
//!
//! ## Rust concepts
//! - `Option::take()` to move the canvas out of `self` for `swap()`, which
//!   consumes it and hands back the other buffer
//! - Free drawing functions that borrow the canvas and the data separately

use crate::display::DisplaySurface;
use crate::mode::DisplayMode;
use crate::sprite::SpriteSheet;
use crate::weather::WeatherReading;
use crate::{Color, MatrixWiring, PanelConfig, create_matrix};
use image::RgbImage;
use rpi_led_matrix::{LedCanvas, LedFont, LedMatrix};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Pause between one-pixel steps while a label slides in.
const SCROLL_DELAY: Duration = Duration::from_millis(30);

pub struct MatrixDisplay {
    matrix: LedMatrix,
    canvas: Option<LedCanvas>,
    panel: PanelConfig,
    sprites: SpriteSheet,
    font: LedFont,
    brightness: u8,
    shown: Option<DisplayMode>,
    label_index: usize,
}

impl MatrixDisplay {
    pub fn new(
        panel: PanelConfig,
        wiring: &MatrixWiring,
        sprites: SpriteSheet,
        font_path: &Path,
        brightness: u8,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let matrix = create_matrix(panel, wiring)?;
        let font = LedFont::new(font_path)
            .map_err(|e| format!("Failed to load font {}: {}", font_path.display(), e))?;
        let canvas = matrix.offscreen_canvas();

        tracing::info!(
            "Matrix ready: {}x{}, {} sprite frames",
            panel.cols,
            panel.rows,
            sprites.frame_count()
        );

        Ok(Self {
            matrix,
            canvas: Some(canvas),
            panel,
            sprites,
            font,
            brightness: brightness.min(100),
            shown: None,
            label_index: 0,
        })
    }

    /// Swap the drawn canvas onto the panel.
    fn present(&mut self, canvas: LedCanvas) {
        self.canvas = Some(self.matrix.swap(canvas));
    }

    fn draw_weather(&mut self, reading: &WeatherReading, label_x: i32) {
        let Some(mut canvas) = self.canvas.take() else {
            return;
        };
        let labels = reading.scroll_labels();
        draw_weather_lines(
            &mut canvas,
            &self.font,
            self.panel,
            &reading.temperature_label(),
            &labels[self.label_index],
            label_x,
            self.brightness,
        );
        self.present(canvas);
    }
}

impl DisplaySurface for MatrixDisplay {
    fn show(&mut self, mode: &DisplayMode) {
        if self.shown.as_ref() == Some(mode) {
            return;
        }

        match mode {
            DisplayMode::Blank => {
                if let Some(mut canvas) = self.canvas.take() {
                    canvas.clear();
                    self.present(canvas);
                }
            }
            DisplayMode::SpriteLoop { frame_index } => {
                if let Some(mut canvas) = self.canvas.take() {
                    draw_frame_to_canvas(&mut canvas, self.sprites.frame(*frame_index));
                    self.present(canvas);
                }
            }
            DisplayMode::WeatherDisplay { reading } => {
                if !matches!(self.shown, Some(DisplayMode::WeatherDisplay { .. })) {
                    self.label_index = 0;
                }
                self.draw_weather(reading, 1);
            }
        }

        self.shown = Some(mode.clone());
    }

    fn scroll_next_label(&mut self) {
        let Some(DisplayMode::WeatherDisplay { reading }) = self.shown.clone() else {
            return;
        };

        self.label_index = (self.label_index + 1) % 2;

        // Slide in from the right edge and settle one pixel from the left
        let mut x = self.panel.cols as i32;
        while x >= 1 {
            self.draw_weather(&reading, x);
            thread::sleep(SCROLL_DELAY);
            x -= 1;
        }
    }
}

/// Draw an RgbImage onto the LED canvas pixel by pixel.
///
/// Sprite frames already carry the configured brightness.
pub fn draw_frame_to_canvas(canvas: &mut LedCanvas, img: &RgbImage) {
    canvas.clear();
    for (x, y, pixel) in img.enumerate_pixels() {
        let c = Color::new(pixel[0], pixel[1], pixel[2]);
        canvas.set(x as i32, y as i32, &c.into());
    }
}

/// Temperature on the top line, a label on the bottom line starting at `label_x`.
fn draw_weather_lines(
    canvas: &mut LedCanvas,
    font: &LedFont,
    panel: PanelConfig,
    temperature: &str,
    label: &str,
    label_x: i32,
    brightness: u8,
) {
    let rows = panel.rows as i32;
    let top_baseline = rows / 2 - 4;
    let bottom_baseline = rows - 4;

    let temp_color = Color::AMBER.apply_brightness(brightness);
    let label_color = Color::SKY.apply_brightness(brightness);

    canvas.clear();
    canvas.draw_text(font, temperature, 1, top_baseline, &temp_color.into(), 0, false);
    canvas.draw_text(font, label, label_x, bottom_baseline, &label_color.into(), 0, false);
}
