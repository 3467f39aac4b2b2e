//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Translate the first one received into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)

use std::future::Future;
use std::io;

use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::Shutdown;

/// Wait for SIGINT or SIGTERM. Returns the name of the signal received.
pub async fn wait_for_signal() -> io::Result<&'static str> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    Ok(name)
}

/// Spawn a task that triggers `shutdown` on the first termination signal.
///
/// If the handlers cannot be installed the server keeps running and the
/// trigger is never fired.
pub fn spawn_signal_listener(shutdown: Shutdown) {
    tokio::spawn(listen(shutdown, wait_for_signal()));
}

async fn listen<F>(shutdown: Shutdown, signal: F)
where
    F: Future<Output = io::Result<&'static str>>,
{
    match signal.await {
        Ok(name) => {
            tracing::info!(signal = name, "Shutdown signal received");
            shutdown.trigger();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers, graceful shutdown disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn test_signal_triggers_shutdown() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        listen(shutdown.clone(), async { Ok("SIGTERM") }).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_install_failure_keeps_serving() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        listen(shutdown.clone(), async {
            Err(io::Error::new(io::ErrorKind::Other, "no signals"))
        })
        .await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
