use anyhow::{Context, Result};
use clap::Parser;
use mealwallet::cli::Cli;
use mealwallet::settings::Settings;
use mealwallet::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let level = if cli.verbose { "debug" } else { settings.log.level.as_str() };
    init_tracing(level);

    cli.run(settings).await
}
