//! Sensor Sample Exchange Demo - Main Entry Point

use sensor_demo::{init_logging, run, DemoConfig};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "sensor-demo.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = DemoConfig::load(&path)?;
    init_logging(&config.log_level)?;

    info!("=== Sensor Demo v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {} (file optional)", path);

    let summary = run(config).await?;
    info!("Summary: {}", serde_json::to_string(&summary)?);

    Ok(())
}
