//! Binary crate for the `umbrella` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Log setup
//! - Human-friendly output formatting

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // variables already set in the environment win over `.env`
    let dotenv_path = dotenvy::dotenv().ok();
    let cmd = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter_from_verbosity(cmd.verbose))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    cmd.run().await
}
