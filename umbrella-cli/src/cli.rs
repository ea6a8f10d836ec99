use std::{fmt::Write as _, path::PathBuf};

use anyhow::{Context, bail};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use tracing::info;
use umbrella_core::{
    DryPolicy, Forecast, ForecastProvider as _, LineCredentials, Notifier as _,
    RainCheck, Reporter, Settings, StdoutReporter, WeatherCredentials,
    notifier::notifier_from_config, now_jst, provider::provider_from_config, rain::slot_label,
    upcoming_entries,
};

const TEST_MESSAGE: &str = "こんにちは！これはLINE Messaging APIから送信されたテストメッセージです。";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "umbrella",
    version,
    about = "Sends a LINE message when rain is forecast in the next 24 hours"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the forecast and notify if rain is expected (default).
    Check {
        /// Evaluate but don't send anything.
        #[arg(long)]
        dry_run: bool,

        /// Also send the dry-day message when no rain is expected.
        #[arg(long)]
        notify_when_dry: bool,
    },

    /// Print the forecast for the next 24 hours.
    Forecast,

    /// Send a test message to the configured LINE recipient.
    SendTest {
        /// Message text.
        #[arg(long, default_value = TEST_MESSAGE)]
        message: String,
    },

    /// Write a settings file with the default values.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let reporter = StdoutReporter;
        let command = self.command.unwrap_or(Command::Check {
            dry_run: false,
            notify_when_dry: false,
        });

        match command {
            Command::InitConfig { force } => {
                let path = match self.config {
                    Some(path) => path,
                    None => Settings::default_path()?,
                };
                if path.exists() && !force {
                    bail!(
                        "Settings file already exists: {}\nHint: pass --force to overwrite it.",
                        path.display()
                    );
                }
                Settings::default().save_to(&path)?;
                reporter.status(&format!("Wrote default settings to {}", path.display()));
            }
            Command::Check {
                dry_run,
                notify_when_dry,
            } => {
                let settings = Settings::load(self.config.as_deref())?;
                let mut check = RainCheck::from_env(&settings)
                    .context("Failed to load credentials from environment")?
                    .dry_run(dry_run);
                if notify_when_dry {
                    check = check.with_dry_policy(DryPolicy::Notify);
                }

                let outcome = check.run(now_jst(), &reporter).await?;
                info!(?outcome, "rain check finished");
            }
            Command::Forecast => {
                let settings = Settings::load(self.config.as_deref())?;
                let credentials = WeatherCredentials::from_env()
                    .context("Failed to load weather credentials from environment")?;

                let provider = provider_from_config(&credentials, &settings)?;
                let forecast = provider
                    .fetch_forecast(&credentials.location)
                    .await
                    .context("Failed to fetch forecast")?;

                reporter.status(&render_forecast(&forecast, now_jst()));
            }
            Command::SendTest { message } => {
                let settings = Settings::load(self.config.as_deref())?;
                let credentials = LineCredentials::from_env()
                    .context("Failed to load LINE credentials from environment")?;

                let notifier = notifier_from_config(&credentials, &settings)?;
                notifier
                    .send_text(&credentials.user_id, &message)
                    .await
                    .context("Failed to send test message")?;

                reporter.status("メッセージ送信に成功しました。");
            }
        }

        Ok(())
    }
}

/// Human-readable listing of the entries inside the next 24 hours.
pub fn render_forecast(forecast: &Forecast, now: DateTime<FixedOffset>) -> String {
    let mut out = format!("【{} のこれから24時間の天気予報】\n", forecast.location_name);

    let mut found = false;
    for entry in upcoming_entries(forecast, now) {
        found = true;
        let _ = writeln!(out, "\n[{}]", slot_label(entry.timestamp));
        if let Some(condition) = entry.conditions.first() {
            let _ = writeln!(out, "天気: {} ({})", condition.category, condition.description);
        }
        let _ = writeln!(out, "気温: {:.1}℃", entry.temperature_c);
        let _ = writeln!(out, "湿度: {}%", entry.humidity_pct);
    }

    if !found {
        out.push_str("これから24時間の天気予報データが見つかりませんでした。\n");
    }

    out.trim_end().to_string()
}
