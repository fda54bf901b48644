//! Data records served by the gateway and stored in the cache.
//!
//! These are the wire shapes of the weather endpoints; the same types are
//! encoded with `postcard` for cache storage, so optional fields stay
//! present (as `null`) instead of being skipped during serialization.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit system for temperatures and wind speeds.
///
/// Part of every cache key; the same location has independent entries per
/// unit system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current-weather snapshot for one location.
///
/// Derived from a single upstream response together with the hourly
/// forecast; immutable once written to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// Display name: the requested city, or a reverse-geocoded name.
    pub name: String,
    pub main: MainMetrics,
    pub weather: Vec<Condition>,
    pub wind: Wind,
    /// Precipitation probability for the coming hour (0.0 - 1.0).
    pub pop: f64,
    pub uv_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainMetrics {
    pub temp: f64,
    pub feels_like: f64,
    /// Relative humidity in percent.
    pub humidity: u8,
}

/// Weather condition descriptor as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u16,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// Wind speed in m/s (metric) or mph (imperial).
    pub speed: f64,
}

/// One hour of forecast data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub dt: DateTime<Utc>,
    pub temp: f64,
    pub feels_like: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: u32,
    pub humidity: u8,
    pub dew_point: f64,
    pub uvi: f64,
    /// Cloud cover in percent.
    pub clouds: u8,
    /// Visibility in metres.
    pub visibility: u32,
    pub wind_speed: f64,
    pub wind_deg: u16,
    pub wind_gust: Option<f64>,
    pub pop: f64,
    pub weather: Vec<Condition>,
    pub rain: Option<Volume>,
    pub snow: Option<Volume>,
}

/// Precipitation volume over the past hour, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "1h")]
    pub one_hour: f64,
}

/// Hourly forecast bundle for one location, as served and as cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub hourly_forecast: Vec<HourlyEntry>,
}
