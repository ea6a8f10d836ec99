//! fetch → evaluate → notify, once per run.

use chrono::{DateTime, FixedOffset};
use tracing::info;

use crate::{
    config::{Credentials, DryPolicy, NotifySettings, Settings, env_lookup},
    error::UmbrellaError,
    model::LocationSpec,
    notifier::{Notifier, notifier_from_config},
    provider::{ForecastProvider, provider_from_config},
    rain::{RainIndicators, need_umbrella},
    report::Reporter,
};

pub const RAIN_SENT: &str = "雨予報メッセージをLINEに送信しました。";
pub const DRY_SENT: &str = "傘不要のメッセージをLINEに送信しました。";
pub const DRY_SILENT: &str = "今日は傘の必要はなさそうです。LINE送信はしません。";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rain expected, summary pushed.
    RainNotified { message: String },
    /// Dry, and the dry-day message was pushed.
    DryNotified { message: String },
    /// Dry, nothing sent.
    NotNeeded,
    /// Nothing sent on request; `message` is what would have gone out.
    DryRun { message: Option<String> },
}

/// One configured rain check: where to look, who to tell, and how.
#[derive(Debug)]
pub struct RainCheck {
    provider: Box<dyn ForecastProvider>,
    notifier: Box<dyn Notifier>,
    location: LocationSpec,
    recipient: String,
    indicators: RainIndicators,
    notify: NotifySettings,
    dry_run: bool,
}

impl RainCheck {
    pub fn new(
        provider: Box<dyn ForecastProvider>,
        notifier: Box<dyn Notifier>,
        location: LocationSpec,
        recipient: String,
    ) -> Self {
        Self {
            provider,
            notifier,
            location,
            recipient,
            indicators: RainIndicators::default(),
            notify: NotifySettings::default(),
            dry_run: false,
        }
    }

    /// Credentials from the process environment, then [`RainCheck::from_config`].
    pub fn from_env(settings: &Settings) -> Result<Self, UmbrellaError> {
        Self::from_lookup(env_lookup, settings)
    }

    /// Credentials are resolved before any client is built, so a missing
    /// variable never reaches the network.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        settings: &Settings,
    ) -> Result<Self, UmbrellaError> {
        let credentials = Credentials::from_lookup(lookup)?;
        Self::from_config(&credentials, settings)
    }

    /// Wire the OpenWeather provider and LINE notifier from configuration.
    pub fn from_config(credentials: &Credentials, settings: &Settings) -> Result<Self, UmbrellaError> {
        settings.validate()?;
        let provider = provider_from_config(&credentials.weather, settings)?;
        let notifier = notifier_from_config(&credentials.line, settings)?;

        Ok(Self::new(
            provider,
            notifier,
            credentials.weather.location.clone(),
            credentials.line.user_id.clone(),
        )
        .with_indicators(settings.rain.clone())
        .with_notify(settings.notify.clone()))
    }

    pub fn with_indicators(mut self, indicators: RainIndicators) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn with_notify(mut self, notify: NotifySettings) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_dry_policy(mut self, policy: DryPolicy) -> Self {
        self.notify.when_dry = policy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the check as of `now`. Any failure aborts the run; status lines are
    /// only reported for stages that completed.
    pub async fn run(
        &self,
        now: DateTime<FixedOffset>,
        reporter: &dyn Reporter,
    ) -> Result<Outcome, UmbrellaError> {
        let forecast = self.provider.fetch_forecast(&self.location).await?;
        info!(
            city = %forecast.location_name,
            entries = forecast.entries.len(),
            "forecast fetched"
        );

        let assessment = need_umbrella(&forecast, now, &self.indicators);
        info!(
            needs_umbrella = assessment.needs_umbrella,
            slots = ?assessment.matching_timestamps,
            "forecast evaluated"
        );

        let outgoing = match (&assessment.message, self.notify.when_dry) {
            (Some(rain), _) => Some(rain.clone()),
            (None, DryPolicy::Notify) => Some(self.notify.dry_message.clone()),
            (None, DryPolicy::Silent) => None,
        };

        if self.dry_run {
            match &outgoing {
                Some(message) => reporter.status(&format!("[dry-run] 送信予定: {message}")),
                None => reporter.status("[dry-run] 送信なし"),
            }
            return Ok(Outcome::DryRun { message: outgoing });
        }

        let Some(message) = outgoing else {
            reporter.status(DRY_SILENT);
            return Ok(Outcome::NotNeeded);
        };

        self.notifier.send_text(&self.recipient, &message).await?;
        info!("notification sent");

        if assessment.needs_umbrella {
            reporter.status(RAIN_SENT);
            Ok(Outcome::RainNotified { message })
        } else {
            reporter.status(DRY_SENT);
            Ok(Outcome::DryNotified { message })
        }
    }
}
