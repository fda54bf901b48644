//! HTTP routes: thin request/response mapping over the weather service.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::error::WeatherError;
use crate::models::{CurrentWeather, Units};
use crate::service::{ForecastSink, ForecastStatus, WeatherService};
use crate::store::coordinate_key;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
    pub forecasts: ForecastSink,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/weather/{city}", get(weather_by_city))
        .route("/weather-by-location", get(weather_by_location))
        .route("/forecast/{city}", get(forecast_by_city))
        .route("/forecast-by-location", get(forecast_by_location))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct UnitsQuery {
    #[serde(default)]
    units: Units,
}

#[derive(Debug, Deserialize)]
struct LocationQuery {
    lat: f64,
    lon: f64,
    #[serde(default)]
    units: Units,
}

async fn weather_by_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(query): Query<UnitsQuery>,
) -> Result<Json<CurrentWeather>, WeatherError> {
    let snapshot = state
        .service
        .fetch_weather(&city, query.units, &state.forecasts)
        .await?;
    Ok(Json(snapshot))
}

async fn weather_by_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<CurrentWeather>, WeatherError> {
    let snapshot = state
        .service
        .fetch_weather_by_coordinates(query.lat, query.lon, query.units, &state.forecasts)
        .await?;
    Ok(Json(snapshot))
}

async fn forecast_by_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(query): Query<UnitsQuery>,
) -> Result<Response, WeatherError> {
    let status = state.service.hourly_forecast(&city, query.units).await?;
    Ok(forecast_response(status))
}

async fn forecast_by_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Response, WeatherError> {
    let key = coordinate_key(query.lat, query.lon);
    let status = state.service.hourly_forecast(&key, query.units).await?;
    Ok(forecast_response(status))
}

fn forecast_response(status: ForecastStatus) -> Response {
    match status {
        ForecastStatus::Ready(bundle) => Json(bundle).into_response(),
        ForecastStatus::Pending { retry_after } => {
            Json(json!({ "status": "pending", "retry_after": retry_after })).into_response()
        }
        ForecastStatus::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Forecast not found" })),
        )
            .into_response(),
    }
}
