//! # Tiltify Feed Monitor
//!
//! Stays connected to the Tiltify real-time socket, shows the latest messages
//! in the terminal, and appends every raw message and every extracted
//! "total amount raised" to log files. Runs until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use lib_common::{AppendLog, ReconnectSupervisor, Sinks, WsConnector};
use std::sync::Arc;
use tokio::signal;

mod tiltify_logic;
use tiltify_logic::{config, display::TerminalDisplay, logger};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    logger::setup_logging(&config.log_dir(), config.log_level()).context("Failed to setup logging")?;

    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let feed_config = config.feed_config();
    feed_config.validate().context("Invalid configuration")?;
    log::info!("Starting Tiltify monitor: {:?}", feed_config);

    let sinks = Sinks {
        display: Arc::new(TerminalDisplay::stdout()),
        raw_log: Arc::new(AppendLog::new(&feed_config.raw_log_path)),
        amount_log: Arc::new(AppendLog::new(&feed_config.amount_log_path)),
    };

    let supervisor = Arc::new(ReconnectSupervisor::new(feed_config, Arc::new(WsConnector), sinks));
    let shutdown = supervisor.shutdown_handle();

    let supervisor_handle = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run().await }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = terminate() => {
            log::info!("SIGTERM received, initiating shutdown.");
        }
    }

    shutdown.shutdown();
    let sessions = supervisor_handle.await.context("Supervisor task failed")?;

    log::info!("Shutdown complete after {} session(s).", sessions);
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut term_signal) => {
            term_signal.recv().await;
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    // On non-unix platforms, just wait forever.
    std::future::pending::<()>().await;
}
