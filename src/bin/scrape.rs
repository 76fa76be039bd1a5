#![forbid(unsafe_code)]

//! Runs one ingestion pass against the configured store and prints the
//! summary as JSON. Suitable for cron alongside the `/scrape` route.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use trendtube::{
    config::{SettingsOverrides, resolve_settings},
    logging,
    pipeline::scrape_trending,
    store::VideoStore,
    youtube::YouTubeClient,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "scrape", about = "Fetch the trending chart once and store it")]
struct ScrapeArgs {
    /// Database path (or file: URL). Falls back to DB_URL.
    #[arg(long)]
    db_url: Option<String>,
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl ScrapeArgs {
    fn into_overrides(self) -> SettingsOverrides {
        SettingsOverrides {
            db_url: self.db_url,
            env_path: self.env_file,
            ..SettingsOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run(ScrapeArgs::parse()).await {
        tracing::error!(error = %format!("{err:#}"), "Scrape failed");
        std::process::exit(1);
    }
}

async fn run(args: ScrapeArgs) -> Result<()> {
    let settings = resolve_settings(args.into_overrides())?;
    let store = VideoStore::open(&settings.db_path)
        .await
        .context("connecting to the video store")?;
    let client = YouTubeClient::from_settings(&settings);

    let summary = scrape_trending(&client, &store).await.map_err(|err| {
        tracing::error!(error_type = err.kind(), error = %err, "Error during YouTube API fetch");
        err
    })?;

    let output = serde_json::json!({
        "success": true,
        "videosCount": summary.videos_count,
        "savedCount": summary.saved_count,
    });
    println!("{output}");
    Ok(())
}
