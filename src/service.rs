//! Cache-and-refresh orchestration.
//!
//! [`WeatherService`] mediates between the HTTP layer, the [`WeatherStore`]
//! and the upstream [`WeatherSource`]. Reads go through the cache; a miss
//! triggers one upstream fetch whose single response seeds both the
//! current-weather snapshot (stored synchronously) and the hourly forecast
//! (stored by a deferred job so the response is never delayed). A cache hit
//! with no stored forecast schedules a refresh-ahead fetch in the
//! background.
//!
//! The `forecast_pending` marker is the only concurrency control: a
//! best-effort, non-atomic check-then-set. Two racing misses can both
//! schedule a refresh; the duplicate work is accepted, and the marker's own
//! TTL bounds how long a crashed refresh can leave a key stuck in pending.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

use crate::error::WeatherError;
use crate::models::{CurrentWeather, ForecastBundle, HourlyEntry, MainMetrics, Units, Wind};
use crate::store::{WeatherStore, coordinate_key};
use crate::upstream::{UpstreamWeather, WeatherSource};

/// Suggested poll delay, in seconds, while a forecast refresh is in flight.
pub const PENDING_RETRY_AFTER_SECS: u64 = 30;

/// Work executed by the forecast worker after a response has been sent.
#[derive(Debug)]
pub enum ForecastJob {
    /// Persist an already-fetched hourly forecast.
    Store {
        key: String,
        units: Units,
        hourly: Vec<HourlyEntry>,
    },
    /// Fetch the forecast from upstream, then persist it.
    Refresh { target: RefreshTarget, units: Units },
}

/// Addressing for a background refresh; mirrors the two fetch paths so the
/// re-fetch goes through the same upstream endpoint as the original request.
#[derive(Debug, Clone)]
pub enum RefreshTarget {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl RefreshTarget {
    fn cache_key(&self) -> String {
        match self {
            RefreshTarget::City(city) => city.clone(),
            RefreshTarget::Coordinates { lat, lon } => coordinate_key(*lat, *lon),
        }
    }
}

/// Sending half of the deferred-task channel, passed into fetch operations.
pub type ForecastSink = mpsc::UnboundedSender<ForecastJob>;

/// Outcome of a forecast read.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastStatus {
    Ready(ForecastBundle),
    Pending { retry_after: u64 },
    NotFound,
}

pub struct WeatherService {
    store: Arc<WeatherStore>,
    source: Arc<dyn WeatherSource>,
}

impl WeatherService {
    pub fn new(store: Arc<WeatherStore>, source: Arc<dyn WeatherSource>) -> Self {
        Self { store, source }
    }

    /// Current weather for a named city, read-through cached.
    ///
    /// On a hit, the snapshot is returned as-is; if no forecast bundle and
    /// no pending marker exist for the key, a background refresh is
    /// scheduled first. On a miss, the upstream is queried once, the
    /// snapshot stored synchronously and the forecast handed to the sink.
    #[instrument(level = "debug", skip(self, sink))]
    pub async fn fetch_weather(
        &self,
        city: &str,
        units: Units,
        sink: &ForecastSink,
    ) -> Result<CurrentWeather, WeatherError> {
        if let Some(cached) = self.store.weather(city, units).await? {
            debug!("Serving current weather for '{city}' from cache");
            self.refresh_ahead(city, RefreshTarget::City(city.to_string()), units, sink)
                .await?;
            return Ok(cached);
        }

        let weather = self.source.by_city(city, units).await?;
        let snapshot = derive_snapshot(city.to_string(), &weather)?;

        // Stored before returning so the next request hits the cache.
        self.store.put_weather(city, units, snapshot.clone()).await?;

        self.store.set_forecast_pending(city, units).await?;
        self.enqueue(
            ForecastJob::Store {
                key: city.to_string(),
                units,
                hourly: weather.hourly,
            },
            city,
            units,
            sink,
        )
        .await;

        Ok(snapshot)
    }

    /// Current weather for a coordinate pair; the cache key is the
    /// truncated `"{lat:.4},{lon:.4}"` string, so nearby coordinates share
    /// an entry.
    #[instrument(level = "debug", skip(self, sink))]
    pub async fn fetch_weather_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
        sink: &ForecastSink,
    ) -> Result<CurrentWeather, WeatherError> {
        let key = coordinate_key(lat, lon);

        if let Some(cached) = self.store.weather(&key, units).await? {
            debug!("Serving current weather for '{key}' from cache");
            self.refresh_ahead(&key, RefreshTarget::Coordinates { lat, lon }, units, sink)
                .await?;
            return Ok(cached);
        }

        let weather = self.source.by_coordinates(lat, lon, units).await?;
        let name = weather
            .resolved_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Location ({lat:.4}, {lon:.4})"));
        let snapshot = derive_snapshot(name, &weather)?;

        self.store.put_weather(&key, units, snapshot.clone()).await?;

        self.store.set_forecast_pending(&key, units).await?;
        self.enqueue(
            ForecastJob::Store {
                key: key.clone(),
                units,
                hourly: weather.hourly,
            },
            &key,
            units,
            sink,
        )
        .await;

        Ok(snapshot)
    }

    /// Forecast read path: pure cache read, no upstream calls and no marker
    /// writes. Callers are expected to have seeded the key via a
    /// current-weather fetch first.
    pub async fn hourly_forecast(
        &self,
        key: &str,
        units: Units,
    ) -> Result<ForecastStatus, WeatherError> {
        if self.store.is_forecast_pending(key, units).await? {
            return Ok(ForecastStatus::Pending {
                retry_after: PENDING_RETRY_AFTER_SECS,
            });
        }

        match self.store.forecast(key, units).await? {
            Some(bundle) => Ok(ForecastStatus::Ready(bundle)),
            None => Ok(ForecastStatus::NotFound),
        }
    }

    /// On a cache hit with no stored forecast and no refresh in flight,
    /// mark the refresh pending and enqueue it. The check-then-set is not
    /// atomic; a racing request may schedule a duplicate refresh.
    async fn refresh_ahead(
        &self,
        key: &str,
        target: RefreshTarget,
        units: Units,
        sink: &ForecastSink,
    ) -> Result<(), WeatherError> {
        if self.store.forecast(key, units).await?.is_some() {
            return Ok(());
        }
        if self.store.is_forecast_pending(key, units).await? {
            return Ok(());
        }

        self.store.set_forecast_pending(key, units).await?;
        self.enqueue(ForecastJob::Refresh { target, units }, key, units, sink)
            .await;
        Ok(())
    }

    /// Hand a job to the worker. If the channel is closed no refresh will
    /// run, so the pending marker is cleared rather than left to its TTL.
    async fn enqueue(&self, job: ForecastJob, key: &str, units: Units, sink: &ForecastSink) {
        if sink.send(job).is_err() {
            warn!("Forecast worker is gone; dropping scheduled refresh for '{key}'");
            if let Err(e) = self.store.clear_forecast_pending(key, units).await {
                error!("Failed to clear pending marker for '{key}': {e:#}");
            }
        }
    }

    /// Wrap an hourly forecast into a bundle and persist it, then clear the
    /// pending marker. The marker is cleared even when the write fails so a
    /// later poll can retry instead of seeing a stale pending state.
    pub async fn store_forecast(&self, key: &str, units: Units, hourly: Vec<HourlyEntry>) {
        let bundle = ForecastBundle {
            hourly_forecast: hourly,
        };
        if let Err(e) = self.store.put_forecast(key, units, bundle).await {
            error!("Failed to store hourly forecast for '{key}': {e:#}");
        }
        if let Err(e) = self.store.clear_forecast_pending(key, units).await {
            error!("Failed to clear pending marker for '{key}': {e:#}");
        }
    }

    /// Fetch the forecast from upstream and persist it. Failures are logged
    /// and the pending marker cleared; nothing is surfaced to a caller.
    pub async fn refresh_forecast(&self, target: RefreshTarget, units: Units) {
        let key = target.cache_key();

        let fetched = match &target {
            RefreshTarget::City(city) => self.source.by_city(city, units).await,
            RefreshTarget::Coordinates { lat, lon } => {
                self.source.by_coordinates(*lat, *lon, units).await
            }
        };

        match fetched {
            Ok(weather) => self.store_forecast(&key, units, weather.hourly).await,
            Err(e) => {
                error!("Forecast refresh for '{key}' failed: {e}");
                if let Err(e) = self.store.clear_forecast_pending(&key, units).await {
                    error!("Failed to clear pending marker for '{key}': {e:#}");
                }
            }
        }
    }
}

/// Derive the cached snapshot from a provider response. The precipitation
/// probability comes from the first forecast hour, so an empty hourly array
/// is a malformed payload.
fn derive_snapshot(
    name: String,
    weather: &UpstreamWeather,
) -> Result<CurrentWeather, WeatherError> {
    let first_hour = weather.hourly.first().ok_or_else(|| {
        WeatherError::unexpected_payload("provider response contains no hourly forecast")
    })?;

    Ok(CurrentWeather {
        name,
        main: MainMetrics {
            temp: weather.current.temp,
            feels_like: weather.current.feels_like,
            humidity: weather.current.humidity,
        },
        weather: weather.current.weather.clone(),
        wind: Wind {
            speed: weather.current.wind_speed,
        },
        pop: first_hour.pop,
        uv_index: weather.current.uvi,
    })
}

/// Drains the deferred-task channel. Runs on its own task, outside any
/// request's critical path; ends when every sender is dropped.
pub async fn run_forecast_worker(
    service: Arc<WeatherService>,
    mut jobs: mpsc::UnboundedReceiver<ForecastJob>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            ForecastJob::Store { key, units, hourly } => {
                service.store_forecast(&key, units, hourly).await;
            }
            ForecastJob::Refresh { target, units } => {
                service.refresh_forecast(target, units).await;
            }
        }
    }
    debug!("Forecast worker shutting down");
}
