//! Graceful shutdown handling
//!
//! This module provides cross-platform signal handling for graceful server
//! shutdown. It listens for termination signals and provides a clean way to
//! shut down the server.

use tokio::sync::oneshot;
use tracing::info;

/// Set up a shutdown signal handler
///
/// Creates a signal handler that listens for termination signals and
/// provides a channel receiver that will be triggered when shutdown is
/// requested.
///
/// # Platform Support
/// * Unix/Linux: Handles SIGINT (Ctrl+C) and SIGTERM signals
/// * Windows: Handles Ctrl+C events
///
/// # Returns
/// * `oneshot::Receiver<()>` - Receiver that will be triggered on shutdown signal
pub async fn setup_shutdown_handler() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut tx = Some(tx);

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            // Set up handlers for common Unix termination signals
            let mut sigint =
                signal(SignalKind::interrupt()).expect("Failed to create SIGINT handler");
            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to create SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => {
                    info!("SIGINT received - initiating graceful shutdown");
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received - initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            use tokio::signal::windows::ctrl_c;

            let mut ctrl_c = ctrl_c().expect("Failed to create Ctrl+C handler");

            ctrl_c.recv().await;
            info!("Ctrl+C received - initiating graceful shutdown");
        }

        // Send shutdown signal if sender is still available
        if let Some(tx) = tx.take() {
            let _ = tx.send(());
        }
    });

    rx
}
