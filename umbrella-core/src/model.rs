use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where to ask the forecast provider about.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSpec {
    Coordinates { lat: f64, lon: f64 },
    City(String),
}

impl fmt::Display for LocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationSpec::Coordinates { lat, lon } => write!(f, "{lat},{lon}"),
            LocationSpec::City(name) => f.write_str(name),
        }
    }
}

/// One weather condition reported for a time slot, e.g. `("Rain", "小雨")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Provider-defined family token such as `Rain` or `Clouds`.
    pub category: String,
    pub description: String,
}

impl Condition {
    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: u8,
    pub conditions: Vec<Condition>,
}

/// A provider forecast. Entries keep the provider's order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location_name: String,
    pub entries: Vec<ForecastEntry>,
}

/// Result of evaluating a forecast for rain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RainAssessment {
    pub needs_umbrella: bool,
    /// `MM/DD HH:MM` labels of the rainy slots, in forecast order.
    pub matching_timestamps: Vec<String>,
    /// Summary sentence, only present when rain is expected.
    pub message: Option<String>,
}
