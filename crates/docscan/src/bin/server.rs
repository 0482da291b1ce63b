//! Extraction server binary
//!
//! Run with: cargo run -p docscan --bin docscan-server -- --config docscan.toml

use clap::Parser;
use docscan::{config::ExtractConfig, server::DocscanServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docscan-server", version, about = "Image and PDF text extraction service")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "DOCSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docscan=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ExtractConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - OCR engine: {:?} (device: {:?})", config.ocr.engine, config.ocr.device);
    tracing::info!(
        "  - Preprocessing: {} (clip limit {}, tiles {}x{})",
        if config.preprocessing.enabled { "CLAHE" } else { "grayscale only" },
        config.preprocessing.clip_limit,
        config.preprocessing.tile_grid.0,
        config.preprocessing.tile_grid.1
    );
    tracing::info!("  - PDF raster DPI: {}", config.pdf.raster_dpi);
    tracing::info!("  - Job workers: {}", config.jobs.workers());

    let server = DocscanServer::new(config);

    println!("\nServer starting...");
    println!("  UI: http://{}/", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
