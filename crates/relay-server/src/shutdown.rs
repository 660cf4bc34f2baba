//! Stop signal shared by the listener, client sessions and the event bridge.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long [`ShutdownCoordinator::graceful_shutdown`] waits by default.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the server-wide stop token.
///
/// Every long-running server task holds a clone from [`token`](Self::token)
/// and exits once it is cancelled.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator whose token is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the stop token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the stop token. Repeated calls are no-ops.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and join `tasks` against one shared deadline.
    ///
    /// Tasks still running at the deadline are aborted. Returns how many
    /// were aborted.
    pub async fn graceful_shutdown(&self, tasks: Vec<JoinHandle<()>>, timeout: Option<Duration>) -> usize {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let deadline = Instant::now() + timeout;
        self.shutdown();
        info!(tasks = tasks.len(), ?timeout, "stopping server tasks");

        let mut aborted = 0;
        for task in tasks {
            let abort = task.abort_handle();
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "server task ended abnormally"),
                Err(_) => {
                    abort.abort();
                    aborted += 1;
                }
            }
        }
        if aborted > 0 {
            warn!(aborted, ?timeout, "server tasks aborted after shutdown deadline");
        }
        aborted
    }
}
