use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{error::ConfigError, model::LocationSpec, rain::RainIndicators};

pub const OPENWEATHER_FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
pub const LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

pub(crate) const RECIPIENT_VARS: &str = "MY_USER_ID (or LINE_USER_ID)";

/// What to do when the next 24 hours look dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DryPolicy {
    /// Report locally, send nothing.
    #[default]
    Silent,
    /// Push `dry_message` to the recipient.
    Notify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub when_dry: DryPolicy,
    pub dry_message: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            when_dry: DryPolicy::Silent,
            dry_message: "今日は傘の必要はなさそうです。".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout for both APIs. Must be at least 1.
    pub timeout_secs: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub forecast_url: String,
    pub push_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            forecast_url: OPENWEATHER_FORECAST_URL.to_string(),
            push_url: LINE_PUSH_URL.to_string(),
        }
    }
}

/// Non-secret settings, stored as TOML.
///
/// Example:
/// ```toml
/// [rain]
/// categories = ["Rain", "雨"]
/// descriptions = ["雨", "小雨", "強い雨"]
///
/// [notify]
/// when_dry = "notify"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub rain: RainIndicators,
    pub notify: NotifySettings,
    pub http: HttpSettings,
    pub endpoints: Endpoints,
}

impl Settings {
    /// Load settings from `path`, or from the platform default location.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()?),
        }
    }

    /// Load settings from disk, or return defaults if the file doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadSettings {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Settings =
            toml::from_str(&contents).map_err(|source| ConfigError::ParseSettings {
                path: path.to_path_buf(),
                source,
            })?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "http.timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Save settings to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::WriteSettings {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml).map_err(write_err)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "umbrella", "umbrella").ok_or(ConfigError::NoConfigDir)?;

        Ok(dirs.config_dir().join("settings.toml"))
    }
}

/// OpenWeatherMap key and location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherCredentials {
    pub api_key: String,
    pub location: LocationSpec,
}

impl WeatherCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Coordinates win over `WEATHER_CITY`. Setting only one of
    /// `WEATHER_LAT`/`WEATHER_LON` is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = required(&lookup, "OPENWEATHER_API_KEY")?;

        let lat = optional(&lookup, "WEATHER_LAT");
        let lon = optional(&lookup, "WEATHER_LON");

        let location = match (lat, lon) {
            (Some(lat), Some(lon)) => LocationSpec::Coordinates {
                lat: parse_coordinate("WEATHER_LAT", &lat, 90.0)?,
                lon: parse_coordinate("WEATHER_LON", &lon, 180.0)?,
            },
            (Some(_), None) => return Err(ConfigError::MissingVar { var: "WEATHER_LON" }),
            (None, Some(_)) => return Err(ConfigError::MissingVar { var: "WEATHER_LAT" }),
            (None, None) => match optional(&lookup, "WEATHER_CITY") {
                Some(city) => LocationSpec::City(city),
                None => {
                    return Err(ConfigError::MissingVar {
                        var: "WEATHER_LAT/WEATHER_LON or WEATHER_CITY",
                    });
                }
            },
        };

        Ok(Self { api_key, location })
    }
}

/// LINE channel token and the single push recipient.
#[derive(Clone, PartialEq)]
pub struct LineCredentials {
    pub channel_token: String,
    pub user_id: String,
}

impl std::fmt::Debug for LineCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineCredentials")
            .field("channel_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl LineCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// `MY_USER_ID` takes precedence over `LINE_USER_ID`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let channel_token = required(&lookup, "LINE_CHANNEL_ACCESS_TOKEN")?;
        let user_id = optional(&lookup, "MY_USER_ID")
            .or_else(|| optional(&lookup, "LINE_USER_ID"))
            .ok_or(ConfigError::MissingVar { var: RECIPIENT_VARS })?;

        Ok(Self {
            channel_token,
            user_id,
        })
    }
}

/// Everything the rain check pipeline needs from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub weather: WeatherCredentials,
    pub line: LineCredentials,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            weather: WeatherCredentials::from_lookup(&lookup)?,
            line: LineCredentials::from_lookup(&lookup)?,
        })
    }
}

pub(crate) fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, var).ok_or(ConfigError::MissingVar { var })
}

fn parse_coordinate(var: &'static str, raw: &str, limit: f64) -> Result<f64, ConfigError> {
    let value: f64 = raw.parse().map_err(|_| ConfigError::InvalidVar {
        var,
        reason: format!("'{raw}' is not a number"),
    })?;

    if !value.is_finite() || value.abs() > limit {
        return Err(ConfigError::InvalidVar {
            var,
            reason: format!("{value} is outside -{limit}..={limit}"),
        });
    }

    Ok(value)
}
