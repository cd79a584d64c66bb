//! Operator cancellation
//!
//! A Ctrl+C sets a watch flag the engine checks before every item and races
//! against in-flight work; a second Ctrl+C exits immediately with status 130.

use std::io::IsTerminal;
use tokio::sync::watch;

/// Sending half of the cancellation flag
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Requests cancellation; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of the cancellation flag
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Creates a linked trigger and listener
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    /// A listener that is never triggered
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested
    ///
    /// Pends forever when the trigger was dropped without firing.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Spawns the Ctrl+C handler and returns its listener
pub fn install_ctrl_c_handler() -> Shutdown {
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            // keep the trigger alive so listeners pend instead of firing
            std::future::pending::<()>().await;
        }

        let is_tty = std::io::stderr().is_terminal();
        if is_tty {
            eprintln!("\n\nShutdown requested, saving progress...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, saving progress");
        }

        trigger.trigger();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });

    shutdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_listener() {
        let (trigger, shutdown) = channel();
        assert!(!shutdown.is_requested());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.requested().await })
        };
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let shutdown = Shutdown::never();
        let result = tokio::time::timeout(Duration::from_millis(20), shutdown.requested()).await;
        assert!(result.is_err());
        assert!(!shutdown.is_requested());
    }
}
