use dotenv::dotenv;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vital_watch_worker::{build_service, run, WorkerConfig};

/// Entry point for the VitalWatch background worker
///
/// Loads configuration, opens the database, then runs the escalation
/// scheduler and the daily summary job until SIGINT or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
        .with(env_filter)
        .init();

    info!("Starting VitalWatch worker");

    let config = WorkerConfig::from_env()?;
    let service = build_service(&config)?;

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(run(service, config.monitoring.clone(), cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    if let Err(e) = worker.await {
        error!(error = %e, "Worker task failed during shutdown");
    }
    info!("Worker shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down worker...");
}
