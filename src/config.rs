//! Process configuration, read from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CACHE_PATH: &str = "weathergate_cache";
const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct Config {
    /// OpenWeatherMap API key.
    pub api_key: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Directory for the on-disk cache keyspace.
    pub cache_path: PathBuf,
    /// Provider root, overridable for tests.
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key =
            env::var("OPENWEATHERMAP_API_KEY").context("Missing OPENWEATHERMAP_API_KEY env var")?;

        let port = match env::var("WEATHERGATE_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("WEATHERGATE_PORT is not a valid port: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        let cache_path = env::var("WEATHERGATE_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH));

        let base_url = env::var("OPENWEATHERMAP_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Config {
            api_key,
            port,
            cache_path,
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test; process environment is shared across the test harness.
    #[test]
    fn test_env_loading() {
        // SAFETY: Test environment, setting test values only
        unsafe {
            env::set_var("OPENWEATHERMAP_API_KEY", "test_key");
            env::remove_var("WEATHERGATE_PORT");
            env::remove_var("WEATHERGATE_CACHE_PATH");
            env::remove_var("OPENWEATHERMAP_BASE_URL");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_key, "test_key");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cache_path, PathBuf::from(DEFAULT_CACHE_PATH));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        // SAFETY: Test environment, setting test values only
        unsafe {
            env::set_var("WEATHERGATE_PORT", "not-a-port");
        }
        let result = Config::from_env();

        // SAFETY: Test cleanup
        unsafe {
            env::remove_var("WEATHERGATE_PORT");
        }
        assert!(result.is_err());
    }
}
