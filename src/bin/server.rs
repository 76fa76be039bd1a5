#![forbid(unsafe_code)]

//! Axum server for the trending pages.
//!
//! Resolves settings, opens the video store and serves
//! [`trendtube::routes::router`] until Ctrl+C.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::signal;
use trendtube::{
    config::{SettingsOverrides, resolve_settings},
    logging,
    routes::{AppState, router},
    store::VideoStore,
    youtube::YouTubeClient,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "server", about = "Serve the trending videos site")]
struct ServerArgs {
    /// Database path (or file: URL). Falls back to DB_URL.
    #[arg(long)]
    db_url: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    assets_dir: Option<PathBuf>,
    /// Dotenv-style file consulted after the process environment.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl ServerArgs {
    fn into_overrides(self) -> SettingsOverrides {
        SettingsOverrides {
            db_url: self.db_url,
            host: self.host,
            port: self.port,
            assets_dir: self.assets_dir,
            env_path: self.env_file,
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run(ServerArgs::parse()).await {
        tracing::error!(error = %format!("{err:#}"), "Server failed");
        std::process::exit(1);
    }
}

async fn run(args: ServerArgs) -> Result<()> {
    let settings = resolve_settings(args.into_overrides())?;

    let store = VideoStore::open(&settings.db_path)
        .await
        .context("connecting to the video store")?;
    tracing::info!(db = %settings.db_path.display(), "Connected to the video store");

    let youtube = YouTubeClient::from_settings(&settings);
    if !youtube.has_api_key() {
        tracing::warn!("YOUTUBE_API_KEY is not set; /scrape will fail until it is configured");
    }

    let state = AppState::new(store, youtube, settings.assets_dir.clone());

    let host: IpAddr = settings
        .host
        .parse()
        .map_err(|_| anyhow!("invalid HOST value: {}", settings.host))?;
    let addr = SocketAddr::new(host, settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still ends the process.
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
    }
}
