//! Operator interrupt handling
//!
//! On Unix, SIGINT, SIGTERM and SIGQUIT are handled; elsewhere only Ctrl-C.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Cancel `cancel` on the first shutdown signal; later signals only log.
pub fn cancel_on_signal(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = wait_for_shutdown_signal().await {
                warn!("Failed to install signal handler: {}", e);
                return;
            }

            request_shutdown(&cancel);
        }
    })
}

/// Cancel the run once. Returns false if it was already cancelled.
fn request_shutdown(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        debug!("already shutting down");
        return false;
    }
    info!("Interrupt received, draining streams");
    cancel.cancel();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_shutdown_request_is_harmless() {
        let cancel = CancellationToken::new();
        let child = cancel.child_token();

        assert!(request_shutdown(&cancel));
        assert!(cancel.is_cancelled());
        assert!(child.is_cancelled());

        assert!(!request_shutdown(&cancel));
        assert!(!request_shutdown(&cancel));
        assert!(cancel.is_cancelled());
    }
}
