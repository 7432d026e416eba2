//! Ratewatch fetch CLI
//!
//! `fetch-rates [BASE] [TARGETS]...` fetches the latest rates once, or on a
//! fixed interval with `--interval`.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use ratewatch_server::app::{self, LogFormat};
use ratewatch_server::fetch::{self, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
use ratewatch_server::{FetchArgs, ServiceConfig};

/// How long to wait for queued change events before exiting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    app::init_tracing(LogFormat::Pretty);

    let args = FetchArgs::parse();
    let request = match args.request() {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let config = ServiceConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return ExitCode::from(EXIT_FAILURE);
    }

    let app = match app::connect(&config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to start");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let status = match request.interval {
        None => {
            let mut stdout = std::io::stdout();
            match fetch::run_once(&app.core, &request, &mut stdout).await {
                Ok(status) => status,
                Err(e) => {
                    error!(error = %e, "Failed to write output");
                    EXIT_FAILURE
                }
            }
        }
        Some(interval) => {
            println!("{}", request.banner());

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
                }
                let _ = shutdown_tx.send(true);
            });

            app::run_schedule(
                app.core.clone(),
                request.base.clone(),
                request.targets.clone(),
                interval,
                shutdown_rx,
            )
            .await;

            println!("Done.");
            EXIT_SUCCESS
        }
    };

    // Queued change events are handled before the runtime goes away
    app.shutdown(SHUTDOWN_GRACE).await;

    ExitCode::from(status)
}
