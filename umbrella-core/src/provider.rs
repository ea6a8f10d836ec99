use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

use crate::{
    config::{Settings, WeatherCredentials},
    error::UmbrellaError,
    model::{Forecast, LocationSpec},
    provider::openweather::OpenWeatherProvider,
};

pub mod openweather;

/// Source of multi-slot forecasts.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    /// Fetch the forecast for `location`. An empty forecast is an error.
    async fn fetch_forecast(&self, location: &LocationSpec) -> Result<Forecast, UmbrellaError>;
}

/// Construct the forecast provider from credentials and settings.
pub fn provider_from_config(
    credentials: &WeatherCredentials,
    settings: &Settings,
) -> Result<Box<dyn ForecastProvider>, UmbrellaError> {
    let provider = OpenWeatherProvider::new(credentials.api_key.clone(), settings)?;

    Ok(Box::new(provider))
}

pub(crate) fn http_client(
    service: &'static str,
    timeout: Duration,
) -> Result<reqwest::Client, UmbrellaError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| UmbrellaError::Transport { service, source })
}
