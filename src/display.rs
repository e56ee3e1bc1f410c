//! Display surface abstraction.
//!
//! The controller hands every tick's [`DisplayMode`] to a surface. Showing
//! the mode that is already up must be a no-op, so surfaces track what they
//! last drew. [`HeadlessDisplay`] stands in for the panel when the binary is
//! built without the `hardware` feature; `render::MatrixDisplay` drives the
//! real matrix.

use crate::mode::{DisplayMode, ModeKind};

pub trait DisplaySurface {
    /// Render `mode`. Repeating the current mode changes nothing.
    fn show(&mut self, mode: &DisplayMode);

    /// Bring the next weather label into view (summary, then detail, then
    /// summary again). Ignored unless weather is showing.
    fn scroll_next_label(&mut self);
}

/// Logs mode changes instead of lighting pixels.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    current: Option<DisplayMode>,
    renders: usize,
    label_index: usize,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode currently "on screen"; `None` before the first show.
    pub fn current(&self) -> Option<&DisplayMode> {
        self.current.as_ref()
    }

    /// Number of actual redraws (repeats excluded).
    pub fn renders(&self) -> usize {
        self.renders
    }

    pub fn label_index(&self) -> usize {
        self.label_index
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn show(&mut self, mode: &DisplayMode) {
        if self.current.as_ref() == Some(mode) {
            return;
        }

        match mode {
            DisplayMode::Blank => tracing::info!("Display: blank"),
            DisplayMode::SpriteLoop { frame_index } => {
                tracing::debug!("Display: sprite frame {}", frame_index)
            }
            DisplayMode::WeatherDisplay { reading } => {
                let [summary, _] = reading.scroll_labels();
                tracing::info!(
                    "Display: weather {} {}",
                    reading.temperature_label(),
                    summary
                );
            }
        }

        // A refreshed reading keeps its label position
        let was_weather = matches!(self.current, Some(DisplayMode::WeatherDisplay { .. }));
        if !was_weather || mode.kind() != ModeKind::WeatherDisplay {
            self.label_index = 0;
        }
        self.current = Some(mode.clone());
        self.renders += 1;
    }

    fn scroll_next_label(&mut self) {
        if let Some(DisplayMode::WeatherDisplay { reading }) = &self.current {
            self.label_index = (self.label_index + 1) % 2;
            let labels = reading.scroll_labels();
            tracing::info!("Display: {}", labels[self.label_index]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Units;
    use crate::weather::WeatherReading;
    use pretty_assertions::assert_eq;

    fn weather() -> DisplayMode {
        DisplayMode::WeatherDisplay {
            reading: WeatherReading {
                location: "London".to_string(),
                condition: "Rain".to_string(),
                description: "light rain".to_string(),
                temperature: 11.0,
                feels_like: 9.5,
                humidity: 88,
                wind_speed: 4.0,
                units: Units::Metric,
            },
        }
    }

    #[test]
    fn blank_twice_is_same_as_once() {
        let mut once = HeadlessDisplay::new();
        once.show(&DisplayMode::Blank);

        let mut twice = HeadlessDisplay::new();
        twice.show(&DisplayMode::Blank);
        twice.show(&DisplayMode::Blank);

        assert_eq!(once.current(), twice.current());
        assert_eq!(once.renders(), twice.renders());
        assert_eq!(twice.renders(), 1);
    }

    #[test]
    fn new_frame_redraws() {
        let mut display = HeadlessDisplay::new();
        display.show(&DisplayMode::SpriteLoop { frame_index: 0 });
        display.show(&DisplayMode::SpriteLoop { frame_index: 1 });
        assert_eq!(display.renders(), 2);
        assert_eq!(
            display.current(),
            Some(&DisplayMode::SpriteLoop { frame_index: 1 })
        );
    }

    #[test]
    fn labels_rotate_while_weather_shows() {
        let mut display = HeadlessDisplay::new();
        display.show(&weather());
        assert_eq!(display.label_index(), 0);

        display.scroll_next_label();
        assert_eq!(display.label_index(), 1);
        display.scroll_next_label();
        assert_eq!(display.label_index(), 0);

        // Same reading again keeps the rotation where it is
        display.scroll_next_label();
        display.show(&weather());
        assert_eq!(display.label_index(), 1);
    }

    #[test]
    fn scroll_ignored_without_weather() {
        let mut display = HeadlessDisplay::new();
        display.show(&DisplayMode::Blank);
        display.scroll_next_label();
        assert_eq!(display.label_index(), 0);
    }
}
