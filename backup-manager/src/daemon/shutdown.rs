//! SIGINT/SIGTERM handling.
//!
//! A signal cancels the shared token, which kills any running dump or
//! restore child; the job is then recorded as failed.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token handed to the orchestrator
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token on the first SIGINT or SIGTERM. Returns immediately
    /// if the token is cancelled some other way.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, cancelling running job..."),
            _ = terminate => info!("Received SIGTERM, cancelling running job..."),
            _ = self.token.cancelled() => return,
        }

        self.token.cancel();
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
