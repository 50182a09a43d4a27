//! Server-wide shutdown signal and session draining.
//!
//! One `CancellationToken` is shared by the HTTP server, every live session
//! and every pending poll. Cancelling it stops accepting connections, closes
//! sessions and answers waiting polls empty. [`ShutdownCoordinator::drain`]
//! then waits for the serve task to end and for the registry to empty.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::ConnectionRegistry;

/// How often the registry is checked while draining.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// What was still running when draining gave up or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// The serve task ended within the grace period.
    pub server_stopped: bool,
    /// Sessions still registered at the end of the grace period.
    pub open_sessions: usize,
}

impl DrainReport {
    /// Everything stopped in time.
    pub fn is_clean(&self) -> bool {
        self.server_stopped && self.open_sessions == 0
    }
}

/// Owns the server-wide shutdown token.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether the token has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the token, then wait up to `grace` for `server_task` to end and
    /// for every session in `registry` to deregister.
    pub async fn drain(
        &self,
        mut server_task: JoinHandle<()>,
        registry: &ConnectionRegistry,
        grace: Duration,
    ) -> DrainReport {
        self.shutdown();
        info!(open_sessions = registry.len(), grace_secs = grace.as_secs_f64(), "draining relay");

        let deadline = tokio::time::Instant::now() + grace;
        let server_stopped = tokio::time::timeout_at(deadline, &mut server_task).await.is_ok();
        if !server_stopped {
            server_task.abort();
        }

        let mut ticker = tokio::time::interval(DRAIN_POLL_INTERVAL);
        while !registry.is_empty() && tokio::time::Instant::now() < deadline {
            let _ = ticker.tick().await;
        }

        let report = DrainReport {
            server_stopped,
            open_sessions: registry.len(),
        };
        if report.is_clean() {
            info!("relay drained");
        } else {
            warn!(
                server_stopped = report.server_stopped,
                open_sessions = report.open_sessions,
                "drain grace period elapsed with work still running"
            );
        }
        report
    }
}
