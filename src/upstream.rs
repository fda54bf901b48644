//! Upstream weather provider client.
//!
//! [`WeatherSource`] is the seam between the orchestration layer and the
//! provider transport; the production implementation wraps the
//! OpenWeatherMap One Call 3.0 API together with its direct and reverse
//! geocoding endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::config::Config;
use crate::error::WeatherError;
use crate::models::{Condition, HourlyEntry, Units};

/// A single provider response: current conditions plus the hourly forecast,
/// and - for coordinate lookups - the reverse-geocoded place name.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamWeather {
    pub current: UpstreamCurrent,
    pub hourly: Vec<HourlyEntry>,
    /// Filled by reverse geocoding; never part of the provider payload.
    #[serde(skip)]
    pub resolved_name: Option<String>,
}

/// Current-conditions block of a One Call response. Unknown provider fields
/// are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamCurrent {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub uvi: f64,
    pub wind_speed: f64,
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    name: String,
    lat: f64,
    lon: f64,
}

/// Source of current conditions and hourly forecasts for a location.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Resolve a city name to coordinates, then fetch its weather.
    /// Fails with a not-found error when the name does not resolve.
    async fn by_city(&self, city: &str, units: Units) -> Result<UpstreamWeather, WeatherError>;

    /// Fetch weather for coordinates, reverse-geocoding a display name.
    async fn by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<UpstreamWeather, WeatherError>;
}

/// Replaces everything outside the printable ASCII range with `?` so that
/// provider-supplied place names are always safe to display.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect()
}

pub struct OpenWeatherClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("weathergate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, WeatherError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            error!("Request to weather provider failed: {e}");
            WeatherError::from(e)
        })?;
        Ok(response)
    }

    /// Resolve a city name to coordinates via the direct geocoding endpoint.
    #[instrument(level = "debug", skip(self))]
    async fn geocode(&self, city: &str) -> Result<(f64, f64), WeatherError> {
        let url = format!(
            "{}/geo/1.0/direct?q={}&limit=1&appid={}",
            self.base_url,
            urlencoding::encode(city),
            self.api_key
        );

        let response = self.get(&url).await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!("Geocoding returned 404 for '{city}'");
            return Err(WeatherError::not_found(city));
        }
        if !status.is_success() {
            error!("Geocoding request for '{city}' failed with status {status}");
            return Err(WeatherError::upstream(format!(
                "geocoding failed with status {status}"
            )));
        }

        let places: Vec<GeoPlace> = response.json().await.map_err(|e| {
            error!("Failed to parse geocoding response: {e}");
            WeatherError::unexpected_payload(e.to_string())
        })?;

        match places.first() {
            Some(place) => {
                debug!("Resolved '{city}' to ({:.4}, {:.4})", place.lat, place.lon);
                Ok((place.lat, place.lon))
            }
            None => {
                warn!("No geocoding results for '{city}'");
                Err(WeatherError::not_found(city))
            }
        }
    }

    async fn one_call(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<UpstreamWeather, WeatherError> {
        let url = format!(
            "{}/data/3.0/onecall?lat={lat}&lon={lon}&appid={}&units={units}&exclude=minutely,daily",
            self.base_url, self.api_key
        );

        let response = self.get(&url).await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!("One Call returned 404 for ({lat}, {lon})");
            return Err(WeatherError::not_found(format!("{lat}, {lon}")));
        }
        if !status.is_success() {
            error!("One Call request failed with status {status}");
            return Err(WeatherError::upstream(format!(
                "weather lookup failed with status {status}"
            )));
        }

        response.json().await.map_err(|e| {
            error!("Failed to parse One Call response: {e}");
            WeatherError::unexpected_payload(e.to_string())
        })
    }

    /// Best-effort reverse geocoding. A transport failure or an empty result
    /// yields `None`; the caller falls back to a coordinate-based name.
    #[instrument(level = "debug", skip(self))]
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Option<String> {
        let url = format!(
            "{}/geo/1.0/reverse?lat={lat}&lon={lon}&limit=1&appid={}&lang=en",
            self.base_url, self.api_key
        );

        let places: Vec<GeoPlace> = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(places) => places,
                Err(e) => {
                    warn!("Failed to parse reverse geocoding response: {e}");
                    return None;
                }
            },
            Ok(response) => {
                warn!(
                    "Reverse geocoding failed with status {} for ({lat}, {lon})",
                    response.status()
                );
                return None;
            }
            Err(e) => {
                warn!("Reverse geocoding request failed: {e}");
                return None;
            }
        };

        places
            .into_iter()
            .next()
            .map(|place| sanitize_name(&place.name))
            .filter(|name| !name.is_empty())
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    #[instrument(level = "debug", skip(self))]
    async fn by_city(&self, city: &str, units: Units) -> Result<UpstreamWeather, WeatherError> {
        let (lat, lon) = self.geocode(city).await?;
        self.one_call(lat, lon, units).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<UpstreamWeather, WeatherError> {
        let mut weather = self.one_call(lat, lon, units).await?;
        weather.resolved_name = self.reverse_geocode(lat, lon).await;
        Ok(weather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_replaces_non_ascii() {
        assert_eq!(sanitize_name("São Paulo"), "S?o Paulo");
        assert_eq!(sanitize_name("Zürich"), "Z?rich");
        assert_eq!(sanitize_name("London"), "London");
        assert_eq!(sanitize_name("東京"), "??");
    }

    #[test]
    fn test_sanitize_name_replaces_control_characters() {
        assert_eq!(sanitize_name("bad\tname"), "bad?name");
        assert_eq!(sanitize_name("line\nbreak"), "line?break");
    }

    #[test]
    fn test_one_call_payload_parses() {
        let payload = serde_json::json!({
            "lat": 51.5085,
            "lon": -0.1257,
            "timezone": "Europe/London",
            "current": {
                "dt": 1_700_000_000,
                "temp": 10.2,
                "feels_like": 9.0,
                "pressure": 1012,
                "humidity": 83,
                "uvi": 0.3,
                "wind_speed": 4.6,
                "wind_deg": 250,
                "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}]
            },
            "hourly": [{
                "dt": 1_700_000_000,
                "temp": 10.2,
                "feels_like": 9.0,
                "pressure": 1012,
                "humidity": 83,
                "dew_point": 7.5,
                "uvi": 0.3,
                "clouds": 75,
                "visibility": 10_000,
                "wind_speed": 4.6,
                "wind_deg": 250,
                "pop": 0.2,
                "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}]
            }]
        });

        let weather: UpstreamWeather = serde_json::from_value(payload).unwrap();
        assert_eq!(weather.current.humidity, 83);
        assert_eq!(weather.hourly.len(), 1);
        assert!(weather.resolved_name.is_none());
    }

    #[test]
    fn test_payload_without_hourly_is_rejected() {
        let payload = serde_json::json!({
            "current": {
                "temp": 10.2,
                "feels_like": 9.0,
                "humidity": 83,
                "uvi": 0.3,
                "wind_speed": 4.6,
                "weather": []
            }
        });
        assert!(serde_json::from_value::<UpstreamWeather>(payload).is_err());
    }
}
