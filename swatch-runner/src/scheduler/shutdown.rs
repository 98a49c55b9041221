//! Shutdown signal wiring

use tokio::sync::watch;
use tracing::{info, warn};

/// Returns a receiver that turns true on the first Ctrl-C
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, finishing in-flight records");
                tx.send_replace(true);
                // Keep the sender alive so receivers do not see a closed channel
                tx.closed().await;
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    rx
}
