use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
    config::Settings,
    error::UmbrellaError,
    model::{Condition, Forecast, ForecastEntry, LocationSpec},
};

use super::{ForecastProvider, http_client};

const SERVICE: &str = "OpenWeather";
/// Descriptions come back in this language; the default rain table matches it.
const LANGUAGE: &str = "ja";

/// OpenWeatherMap 5 day / 3 hour forecast client.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, settings: &Settings) -> Result<Self, UmbrellaError> {
        Ok(Self {
            api_key,
            endpoint: settings.endpoints.forecast_url.clone(),
            http: http_client(SERVICE, settings.http.timeout())?,
        })
    }

    fn query(&self, location: &LocationSpec) -> Vec<(&'static str, String)> {
        let mut query = match location {
            LocationSpec::Coordinates { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
            LocationSpec::City(name) => vec![("q", name.clone())],
        };

        query.extend([
            ("appid", self.api_key.clone()),
            ("lang", LANGUAGE.to_string()),
            ("units", "metric".to_string()),
        ]);
        query
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    #[serde(with = "chrono::serde::ts_seconds")]
    dt: DateTime<Utc>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

impl From<OwForecastEntry> for ForecastEntry {
    fn from(entry: OwForecastEntry) -> Self {
        ForecastEntry {
            timestamp: entry.dt,
            temperature_c: entry.main.temp,
            humidity_pct: entry.main.humidity,
            conditions: entry
                .weather
                .into_iter()
                .map(|w| Condition::new(w.main, w.description))
                .collect(),
        }
    }
}

/// Decode a forecast response body. Zero entries is an error.
pub fn parse_forecast(body: &str) -> Result<Forecast, UmbrellaError> {
    let parsed: OwForecastResponse = serde_json::from_str(body)
        .map_err(|source| UmbrellaError::Decode { service: SERVICE, source })?;

    if parsed.list.is_empty() {
        return Err(UmbrellaError::EmptyForecast {
            location: parsed.city.name,
        });
    }

    Ok(Forecast {
        location_name: parsed.city.name,
        entries: parsed.list.into_iter().map(ForecastEntry::from).collect(),
    })
}

#[async_trait]
impl ForecastProvider for OpenWeatherProvider {
    #[instrument(skip_all, fields(location = %location))]
    async fn fetch_forecast(&self, location: &LocationSpec) -> Result<Forecast, UmbrellaError> {
        debug!(endpoint = %self.endpoint, lang = LANGUAGE, "requesting forecast");

        let transport = |source| UmbrellaError::Transport { service: SERVICE, source };

        let res = self
            .http
            .get(&self.endpoint)
            .query(&self.query(location))
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        let body = res.text().await.map_err(transport)?;

        if !status.is_success() {
            warn!(%status, "forecast request rejected");
            return Err(UmbrellaError::provider(SERVICE, status, &body));
        }

        let forecast = parse_forecast(&body)?;
        debug!(
            city = %forecast.location_name,
            entries = forecast.entries.len(),
            "forecast decoded"
        );

        Ok(forecast)
    }
}
