//! TTL-based cache store backing the gateway.
//!
//! Entries are `postcard`-encoded and stamped with an absolute expiry;
//! expired entries are treated as misses and removed on read. On top of the
//! generic store, [`WeatherStore`] fixes the key schema and TTLs used by the
//! weather endpoints:
//!
//! - `weather:{key}:{units}` - current-weather snapshot, 900 s
//! - `forecast:{key}:{units}` - hourly forecast bundle, 1800 s
//! - `forecast_pending:{key}:{units}` - in-flight refresh marker, 60 s
//!
//! The pending marker's TTL doubles as the safety net against a refresh
//! task that dies without clearing it.

use std::fmt::Debug;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::task;

use crate::models::{CurrentWeather, ForecastBundle, Units};

/// Lifetime of a cached current-weather snapshot.
pub const WEATHER_TTL: Duration = Duration::from_secs(900);
/// Lifetime of a cached hourly forecast bundle.
pub const FORECAST_TTL: Duration = Duration::from_secs(1800);
/// Lifetime of a forecast-pending marker.
pub const PENDING_TTL: Duration = Duration::from_secs(60);

/// Cache-addressing string for a coordinate query.
///
/// Both values are truncated to 4 decimal places, so coordinates within
/// roughly 11 m share a cache entry.
#[must_use]
pub fn coordinate_key(lat: f64, lon: f64) -> String {
    format!("{lat:.4},{lon:.4}")
}

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (seconds)
}

/// Key-value store with per-entry expiration.
pub struct TtlCache {
    store: Keyspace,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl TtlCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let store = db.keyspace("cache", fjall::KeyspaceCreateOptions::default)?;
        Ok(TtlCache { store })
    }

    /// Stores a serializable value with a time-to-live (TTL). An existing
    /// entry under the same key is overwritten.
    #[tracing::instrument(name = "cache_put", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize + Send + Debug + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;

        let _ = task::spawn_blocking(move || store.insert(key, bytes)).await?;
        Ok(())
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "cache_get", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        if let Some(bytes) = maybe_bytes {
            let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

            if now < entry.expires_at {
                tracing::debug!("Key found and still fresh");
                Ok(Some(entry.value))
            } else {
                tracing::debug!("Key found but expired");
                self.remove(key).await?;
                Ok(None)
            }
        } else {
            tracing::debug!("Key not found");
            Ok(None)
        }
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        let _ = task::spawn_blocking(move || store.remove(key)).await?;
        Ok(())
    }
}

/// The gateway's view of the cache: weather snapshots, forecast bundles and
/// pending markers, addressed by (location key, units).
pub struct WeatherStore {
    cache: TtlCache,
}

impl WeatherStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(WeatherStore {
            cache: TtlCache::open(path)?,
        })
    }

    fn weather_key(key: &str, units: Units) -> String {
        format!("weather:{key}:{units}")
    }

    fn forecast_key(key: &str, units: Units) -> String {
        format!("forecast:{key}:{units}")
    }

    fn pending_key(key: &str, units: Units) -> String {
        format!("forecast_pending:{key}:{units}")
    }

    pub async fn weather(&self, key: &str, units: Units) -> Result<Option<CurrentWeather>> {
        self.cache.get(&Self::weather_key(key, units)).await
    }

    pub async fn put_weather(
        &self,
        key: &str,
        units: Units,
        snapshot: CurrentWeather,
    ) -> Result<()> {
        self.cache
            .put(&Self::weather_key(key, units), snapshot, WEATHER_TTL)
            .await
    }

    pub async fn forecast(&self, key: &str, units: Units) -> Result<Option<ForecastBundle>> {
        self.cache.get(&Self::forecast_key(key, units)).await
    }

    pub async fn put_forecast(&self, key: &str, units: Units, bundle: ForecastBundle) -> Result<()> {
        self.cache
            .put(&Self::forecast_key(key, units), bundle, FORECAST_TTL)
            .await
    }

    /// Marks a forecast refresh as in flight. The value is irrelevant;
    /// existence is what is checked.
    pub async fn set_forecast_pending(&self, key: &str, units: Units) -> Result<()> {
        self.cache
            .put(&Self::pending_key(key, units), 1u8, PENDING_TTL)
            .await
    }

    pub async fn is_forecast_pending(&self, key: &str, units: Units) -> Result<bool> {
        Ok(self
            .cache
            .get::<u8>(&Self::pending_key(key, units))
            .await?
            .is_some())
    }

    pub async fn clear_forecast_pending(&self, key: &str, units: Units) -> Result<()> {
        self.cache.remove(&Self::pending_key(key, units)).await
    }
}
