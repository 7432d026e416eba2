//! Ratewatch Server Binary
//!
//! Serves the latest exchange rates over HTTP and optionally refreshes them
//! on a fixed schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use ratewatch_server::app::{self, LogFormat};
use ratewatch_server::{RatesApi, ServiceConfig};

/// How long shutdown waits for queued change events.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::init_tracing(LogFormat::Json);

    info!("Starting Ratewatch server");

    // Load configuration
    let config = ServiceConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let app = app::connect(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let schedule = if config.schedule.is_enabled() {
        let (base, targets) = config.schedule.currencies().map_err(anyhow::Error::msg)?;
        Some(tokio::spawn(app::run_schedule(
            app.core.clone(),
            base,
            targets,
            config.schedule.interval,
            shutdown_rx,
        )))
    } else {
        info!("Scheduled fetching disabled");
        None
    };

    let listener = TcpListener::bind((config.listen_addr.as_str(), config.listen_port)).await?;
    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        "Server listening"
    );

    let api = Arc::new(RatesApi::new(app.core.clone()));

    let served = tokio::select! {
        result = api.serve(listener) => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            signal
        }
    };

    // Receiver is gone if the schedule already stopped
    let _ = shutdown_tx.send(true);
    if let Some(handle) = schedule {
        handle.await?;
    }

    // Open connections may still hold the core for a while
    if let Some(handled) = app.shutdown(SHUTDOWN_GRACE).await {
        info!(handled, "Change events drained");
    }

    if let Err(e) = served {
        error!(error = %e, "Server stopped with an error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
