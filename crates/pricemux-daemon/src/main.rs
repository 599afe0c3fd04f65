//! pricemux - multi-exchange realtime price aggregation daemon.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Multi-exchange realtime price aggregation daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PRICEMUX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    pricemux_ws::init_crypto();

    let args = Args::parse();

    pricemux_telemetry::init_logging()?;

    info!("Starting pricemux v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > PRICEMUX_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PRICEMUX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = pricemux_daemon::AppConfig::from_file(&config_path)?;
    let app = pricemux_daemon::Application::new(config);

    app.run().await?;

    Ok(())
}
