//! `weathergate` - weather-data API gateway
//!
//! Serves current conditions and hourly forecasts from OpenWeatherMap
//! through a read-through cache with asynchronous forecast population.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod upstream;
pub mod web;

// Re-export core types for public API
pub use config::Config;
pub use error::WeatherError;
pub use models::{Condition, CurrentWeather, ForecastBundle, HourlyEntry, Units};
pub use service::{
    ForecastJob, ForecastSink, ForecastStatus, RefreshTarget, WeatherService, run_forecast_worker,
};
pub use store::{WeatherStore, coordinate_key};
pub use upstream::{OpenWeatherClient, UpstreamWeather, WeatherSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherError>;
