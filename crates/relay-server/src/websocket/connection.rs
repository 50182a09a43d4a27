//! Handle to one live WebSocket connection.
//!
//! The socket itself is owned by the session task. Everyone else talks to
//! the client through this handle: frames go into a bounded queue drained by
//! the session's writer, and a termination token tells the session to close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use relay_core::Identity;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Result of queueing a frame for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame is queued for the writer.
    Queued,
    /// The outbound queue is full; the frame was dropped.
    Full,
    /// The writer is gone; the connection is dead.
    Closed,
}

/// A registered live connection.
pub struct LiveConnection {
    id: String,
    identity: Identity,
    tx: mpsc::Sender<Utf8Bytes>,
    terminated: CancellationToken,
    connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl LiveConnection {
    /// Create a handle for `identity` that feeds `tx`.
    pub fn new(identity: Identity, tx: mpsc::Sender<Utf8Bytes>) -> Self {
        Self {
            id: format!("conn_{}", Uuid::now_v7()),
            identity,
            tx,
            terminated: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Unique connection ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity this connection was opened under.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queue a frame without waiting.
    pub fn send(&self, frame: Utf8Bytes) -> SendOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Full
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Frames dropped because the outbound queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Signal the owning session to close this connection.
    pub fn terminate(&self) {
        self.terminated.cancel();
    }

    /// Whether termination has been signalled.
    pub fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }

    /// Resolves once termination has been signalled.
    pub fn terminated(&self) -> WaitForCancellationFuture<'_> {
        self.terminated.cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnection")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}
