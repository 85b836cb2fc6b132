//! Graceful shutdown signal handling: watches SIGTERM/SIGINT and cancels a shared
//! token when either arrives, so `supervisor::run`'s shutdown-grace wait
//! (`spec.md` §6) knows why it started draining in-flight directions.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Which signal triggered cancellation, for the shutdown log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Sigterm,
    Sigint,
}

impl ShutdownSignal {
    fn as_str(self) -> &'static str {
        match self {
            ShutdownSignal::Sigterm => "SIGTERM",
            ShutdownSignal::Sigint => "SIGINT",
        }
    }
}

/// Watches SIGTERM and SIGINT and cancels a shared token when either arrives.
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Registers signal handlers. Returns an error if registration fails.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let inner = CancellationToken::new();
        let outer = inner.clone();
        let task_tracker = TaskTracker::new();
        task_tracker.spawn(async move {
            let received = tokio::select! {
                _ = sigterm.recv() => ShutdownSignal::Sigterm,
                _ = sigint.recv() => ShutdownSignal::Sigint,
            };
            info!(signal = received.as_str(), "shutdown signal received, cancelling active directions");
            inner.cancel();
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: outer,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits for a shutdown signal and for the signal-watching task to finish.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
