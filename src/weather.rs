//! Weather feed: the reading shown on the panel and the OpenWeatherMap client that fetches it.
//!
//! The decision core only cares whether a reading exists. The fields are
//! here for the renderers, which turn them into a temperature line and two
//! scrolling labels.

use crate::config::Units;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";

// ── Reading ──────────────────────────────────────────────────────────

/// Current conditions for one location.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct WeatherReading {
    /// City name as reported by the feed
    pub location: String,
    /// Condition group, e.g. "Clouds"
    pub condition: String,
    /// Free-text description, e.g. "broken clouds"
    pub description: String,
    pub temperature: f32,
    pub feels_like: f32,
    /// Relative humidity in percent
    pub humidity: u8,
    pub wind_speed: f32,
    pub units: Units,
}

impl WeatherReading {
    /// Big top line, e.g. "72°F".
    pub fn temperature_label(&self) -> String {
        format!(
            "{:.0}°{}",
            self.temperature,
            self.units.temperature_suffix()
        )
    }

    /// The two rotating bottom lines: summary first, then detail.
    pub fn scroll_labels(&self) -> [String; 2] {
        let summary = if self.description.is_empty() {
            self.condition.clone()
        } else {
            title_case(&self.description)
        };
        let detail = format!(
            "Humidity {}% Wind {:.0} {}",
            self.humidity,
            self.wind_speed,
            self.units.speed_suffix()
        );
        [summary, detail]
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ── Errors and trait ─────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("weather service answered HTTP {0}")]
    Status(u16),

    #[error("bad weather payload: {0}")]
    Payload(String),

    #[error("previous request failed, retrying in {0:?}")]
    CoolingDown(Duration),
}

/// Source of current weather. Any failure is transient from the caller's view.
pub trait WeatherFeed {
    fn fetch(&mut self, location: &str, units: Units) -> Result<WeatherReading, FetchError>;
}

// ── OpenWeatherMap JSON ──────────────────────────────────────────────

#[derive(Deserialize)]
struct OwmCurrent {
    name: Option<String>,
    main: Option<OwmMain>,
    weather: Option<Vec<OwmCondition>>,
    wind: Option<OwmWind>,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: Option<f32>,
    feels_like: Option<f32>,
    humidity: Option<u8>,
}

#[derive(Deserialize)]
struct OwmCondition {
    main: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct OwmWind {
    speed: Option<f32>,
}

/// Parse an OpenWeatherMap "current weather" response body.
///
/// Only the temperature is mandatory; everything else falls back to empty
/// or zero so a sparse payload still renders.
pub fn parse_current(body: &str, units: Units) -> Result<WeatherReading, FetchError> {
    let root: OwmCurrent =
        serde_json::from_str(body).map_err(|e| FetchError::Payload(e.to_string()))?;

    let main = root
        .main
        .ok_or_else(|| FetchError::Payload("missing \"main\" block".to_string()))?;
    let temperature = main
        .temp
        .ok_or_else(|| FetchError::Payload("missing temperature".to_string()))?;
    let condition = root.weather.and_then(|w| w.into_iter().next());

    Ok(WeatherReading {
        location: root.name.unwrap_or_default(),
        condition: condition
            .as_ref()
            .and_then(|c| c.main.clone())
            .unwrap_or_default(),
        description: condition.and_then(|c| c.description).unwrap_or_default(),
        temperature,
        feels_like: main.feels_like.unwrap_or(temperature),
        humidity: main.humidity.unwrap_or(0),
        wind_speed: root.wind.and_then(|w| w.speed).unwrap_or(0.0),
        units,
    })
}

// ── HTTP client ──────────────────────────────────────────────────────

/// Blocking OpenWeatherMap client.
///
/// After a failed request, further calls within `retry_cooldown` fail fast
/// with [`FetchError::CoolingDown`] so a dead network or a rejected token
/// is not hammered at the main loop's poll rate.
pub struct OpenWeatherFeed {
    client: reqwest::blocking::Client,
    base_url: String,
    api_token: String,
    retry_cooldown: Duration,
    last_failure: Option<Instant>,
}

impl OpenWeatherFeed {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
        retry_cooldown: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_token: api_token.into(),
            retry_cooldown,
            last_failure: None,
        })
    }

    fn request(&self, location: &str, units: Units) -> Result<WeatherReading, FetchError> {
        let url = format!("{}/data/2.5/weather", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[
                ("q", location),
                ("units", units.as_query()),
                ("appid", self.api_token.as_str()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_current(&body, units)
    }
}

impl WeatherFeed for OpenWeatherFeed {
    fn fetch(&mut self, location: &str, units: Units) -> Result<WeatherReading, FetchError> {
        if let Some(failed_at) = self.last_failure {
            let since = failed_at.elapsed();
            if since < self.retry_cooldown {
                return Err(FetchError::CoolingDown(self.retry_cooldown - since));
            }
        }

        let result = self.request(location, units);
        self.last_failure = match &result {
            Ok(_) => None,
            Err(_) => Some(Instant::now()),
        };
        result
    }
}
