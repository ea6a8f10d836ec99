use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Problems with the environment or the settings file. All of them are
/// detected before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {var} is not set")]
    MissingVar { var: &'static str },

    #[error("environment variable {var} is invalid: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("setting {key} is invalid: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("failed to read settings file {}", path.display())]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}", path.display())]
    ParseSettings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write settings file {}", path.display())]
    WriteSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings")]
    SerializeSettings(#[from] toml::ser::Error),

    #[error("could not determine platform config directory")]
    NoConfigDir,
}

#[derive(Debug, Error)]
pub enum UmbrellaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{service} request failed")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Provider {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode {service} response")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("forecast for {location} contained no entries")]
    EmptyForecast { location: String },

    #[error("refusing to send an empty message")]
    EmptyMessage,
}

impl UmbrellaError {
    /// HTTP status of a provider failure, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UmbrellaError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn provider(service: &'static str, status: StatusCode, body: &str) -> Self {
        UmbrellaError::Provider {
            service,
            status,
            body: truncate_body(body),
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
