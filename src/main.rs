use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use rss_mirror::feed::build_client;
use rss_mirror::Config;

#[derive(Parser, Debug)]
#[command(
    name = "rss-mirror",
    about = "Mirror one RSS feed into a cached, retention-bounded feed with preview images"
)]
struct Args {
    /// TOML config file (defaults are used for anything it leaves out)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the source feed URL
    #[arg(long, value_name = "URL")]
    feed_url: Option<String>,

    /// Override the store file path
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Override the output feed path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Override the retention window in days
    #[arg(long, value_name = "DAYS")]
    retention_days: Option<u32>,

    /// Keep feed enclosures instead of fetching og:image previews
    #[arg(long)]
    no_previews: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(url) = self.feed_url {
            config.feed_url = url;
        }
        if let Some(store) = self.store {
            config.store_path = store;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(days) = self.retention_days {
            config.retention_days = days;
        }
        if self.no_previews {
            config.resolve_previews = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    tracing::debug!(?config, "Starting mirror run");

    let client = build_client().context("Failed to build HTTP client")?;
    let summary = rss_mirror::run(&config, &client).await?;

    println!(
        "{}: {} new, {} updated, {} pruned, {} cached",
        config.output_path.display(),
        summary.inserted,
        summary.updated,
        summary.pruned,
        summary.total
    );
    Ok(())
}
