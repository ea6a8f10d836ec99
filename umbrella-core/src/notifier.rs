//! Push notifications to a single recipient.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, instrument, warn};

use crate::{
    config::{LineCredentials, RECIPIENT_VARS, Settings},
    error::{ConfigError, UmbrellaError},
    provider::http_client,
};

const SERVICE: &str = "LINE";

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Send one plain-text message. A single attempt, no retries.
    async fn send_text(&self, recipient: &str, message: &str) -> Result<(), UmbrellaError>;
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// LINE Messaging API push client.
#[derive(Clone)]
pub struct LineNotifier {
    http: Client,
    endpoint: String,
    channel_token: String,
}

impl Debug for LineNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineNotifier")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl LineNotifier {
    pub fn new(channel_token: String, settings: &Settings) -> Result<Self, UmbrellaError> {
        if channel_token.is_empty() {
            return Err(ConfigError::MissingVar {
                var: "LINE_CHANNEL_ACCESS_TOKEN",
            }
            .into());
        }

        Ok(Self {
            http: http_client(SERVICE, settings.http.timeout())?,
            endpoint: settings.endpoints.push_url.clone(),
            channel_token,
        })
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    #[instrument(skip_all, fields(to = %recipient))]
    async fn send_text(&self, recipient: &str, message: &str) -> Result<(), UmbrellaError> {
        if message.is_empty() {
            return Err(UmbrellaError::EmptyMessage);
        }
        if recipient.is_empty() {
            return Err(ConfigError::MissingVar { var: RECIPIENT_VARS }.into());
        }

        let request = PushRequest {
            to: recipient,
            messages: [TextMessage {
                kind: "text",
                text: message,
            }],
        };

        debug!(message_len = message.len(), "sending push message");

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.channel_token)
            .json(&request)
            .send()
            .await
            .map_err(|source| UmbrellaError::Transport { service: SERVICE, source })?;

        let status = res.status();
        if status != StatusCode::OK {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "push message rejected");
            return Err(UmbrellaError::provider(SERVICE, status, &body));
        }

        Ok(())
    }
}

/// Build the LINE notifier from credentials and settings.
pub fn notifier_from_config(
    credentials: &LineCredentials,
    settings: &Settings,
) -> Result<Box<dyn Notifier>, UmbrellaError> {
    Ok(Box::new(LineNotifier::new(
        credentials.channel_token.clone(),
        settings,
    )?))
}
