//! Core library for the `umbrella` CLI.
//!
//! This crate defines:
//! - Credentials (environment) and settings (TOML) handling
//! - The OpenWeatherMap forecast provider and LINE push notifier
//! - Rain evaluation over the next 24 hours
//! - The pipeline tying them together
//!
//! It is used by `umbrella-cli`, but can also be driven from other binaries or tests.

pub mod config;
pub mod error;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod provider;
pub mod rain;
pub mod report;

pub use config::{Credentials, DryPolicy, LineCredentials, Settings, WeatherCredentials};
pub use error::{ConfigError, UmbrellaError};
pub use model::{Condition, Forecast, ForecastEntry, LocationSpec, RainAssessment};
pub use notifier::{LineNotifier, Notifier};
pub use pipeline::{Outcome, RainCheck};
pub use provider::{ForecastProvider, openweather::OpenWeatherProvider};
pub use rain::{RainIndicators, need_umbrella, now_jst, upcoming_entries};
pub use report::{Reporter, StdoutReporter};
