use clap::Parser;
use dotenvy::dotenv;
use orchestrator_platform::{Platform, PlatformConfig};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path, layered on top of configs/orchestrator.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let args = Args::parse();
    let config = PlatformConfig::load_from_path(args.config)?;
    let name = config.metadata.name.clone();
    let environment = config.metadata.environment.clone();

    let runtime = Platform::new(config).start().await?;
    info!(%name, %environment, "orchestrator started");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    if let Err(err) = runtime.shutdown().await {
        error!(error = %err, "error during shutdown");
        return Err(err.into());
    }

    info!("orchestrator stopped");
    Ok(())
}
