use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use weathergate::api::AppState;
use weathergate::{Config, OpenWeatherClient, WeatherService, WeatherStore, service, web};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weathergate=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(WeatherStore::open(&config.cache_path)?);
    let source = Arc::new(OpenWeatherClient::new(&config)?);
    let service = Arc::new(WeatherService::new(store, source));

    // Forecast writes happen off the request path, on a dedicated worker.
    let (forecasts, jobs) = mpsc::unbounded_channel();
    tokio::spawn(service::run_forecast_worker(service.clone(), jobs));

    web::run(config.port, AppState { service, forecasts }).await
}
