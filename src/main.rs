use anyhow::Result;
use mesto_api::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize logging and metrics
    let metrics = telemetry::init(&config.telemetry)?;

    info!("Starting Mesto API");
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config, metrics).await
}
