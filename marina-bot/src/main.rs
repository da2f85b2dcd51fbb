//! Marina Bot - Main entry point.

use anyhow::Result;
use marina_bot::start_relay;
use marina_common::config::Config;
use marina_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Marina Bot v{}", env!("CARGO_PKG_VERSION"));

    start_relay(&config).await
}
