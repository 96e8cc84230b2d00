//! Upload tracker server binary
//!
//! Run with: cargo run -p upload-tracker --bin upload-tracker-server -- --config tracker.toml

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_tracker::{
    config::TrackerConfig, server::TrackerServer, HttpStatusClient, NoopDocumentActions,
};

#[derive(Debug, Parser)]
#[command(name = "upload-tracker-server", version, about = "Upload and pipeline-status tracker")]
struct Args {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_tracker=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            TrackerConfig::from_file(path)?
        }
        None => TrackerConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Pipeline backend: {}", config.backend.base_url);
    tracing::info!("  - Poll interval: {}ms", config.polling.interval_ms);
    tracing::info!(
        "  - Max consecutive failures: {}",
        config.polling.max_consecutive_failures
    );

    let client = Arc::new(HttpStatusClient::new(&config.backend)?);
    let server = TrackerServer::new(config, client, Arc::new(NoopDocumentActions));

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
