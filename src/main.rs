use anyhow::{Context, Result};
use localvolts::logging::init_logging;
use localvolts::runtime::forward_shutdown;
use localvolts::time::SystemClock;
use localvolts::{APP_VERSION, Config, Coordinator, IntervalClient, PollRuntime};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "Localvolts poller {} starting for NMI {}",
        APP_VERSION, config.api.nmi
    );

    let client = IntervalClient::new(&config.api).context("Failed to build API client")?;
    let coordinator = Coordinator::with_clock(client, SystemClock);
    let runtime = PollRuntime::new(
        coordinator,
        Duration::from_millis(config.poll_interval_ms),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    runtime.run(shutdown_rx).await;
    info!("Poller shutdown complete");
    Ok(())
}
