//! Error types for the weather gateway.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Main error type for gateway operations.
///
/// Synchronous fetch paths propagate these to the HTTP layer; background
/// refresh tasks log them and never surface them to a caller.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// The location name or coordinates did not resolve upstream.
    #[error("Location not found: {location}")]
    NotFound { location: String },

    /// Connectivity or transport failure reaching the upstream provider.
    #[error("Could not connect to weather provider: {message}")]
    Upstream { message: String },

    /// The provider answered, but the payload is missing expected fields.
    /// Indistinguishable from `Upstream` for callers; logged separately.
    #[error("Unexpected weather provider response: {message}")]
    UnexpectedPayload { message: String },

    /// Cache operation failure.
    #[error("Cache error: {source}")]
    Cache {
        #[from]
        source: anyhow::Error,
    },
}

impl WeatherError {
    pub fn not_found<S: Into<String>>(location: S) -> Self {
        Self::NotFound {
            location: location.into(),
        }
    }

    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn unexpected_payload<S: Into<String>>(message: S) -> Self {
        Self::UnexpectedPayload {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            WeatherError::NotFound { .. } => StatusCode::NOT_FOUND,
            WeatherError::Upstream { .. }
            | WeatherError::UnexpectedPayload { .. }
            | WeatherError::Cache { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::unexpected_payload(err.to_string())
        } else {
            Self::upstream(err.to_string())
        }
    }
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
