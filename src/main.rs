//! lcp - personal activity cache service
//!
//! Keeps a refreshed copy of GitHub, Apple Music, Steam and Strava data and
//! serves it as JSON over HTTP.

use clap::Parser;
use tokio::net::TcpListener;

use lcp::app::App;
use lcp::cli::{Cli, Config};
use lcp::data::request::http_client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(cache_dir = %config.cache_dir.display(), "starting lcp");

    let client = http_client()?;
    let app = App::from_config(&config, client).await;

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, caches = ?app.caches(), "listening");

    app.serve(listener, config.access_token.clone()).await?;
    Ok(())
}
