//! Capacity-one mailboxes for the long-poll fallback.
//!
//! Each identity gets a slot the first time anyone publishes to it or polls
//! it. A slot holds at most one message: a publish into an occupied slot is
//! dropped, and a poll takes whatever is there or waits for it.
//!
//! The map lock is only held to find or create a slot. Waiting happens on
//! the slot's own [`Notify`], so a blocked poll never stalls other
//! identities.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relay_core::Identity;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The message is stored and waiting for a poll.
    Accepted,
    /// The slot was already full; the message was discarded.
    Dropped,
}

impl PublishOutcome {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Dropped => "dropped",
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    pending: Mutex<Option<String>>,
    arrived: Notify,
}

impl Slot {
    fn take(&self) -> Option<String> {
        self.pending.lock().take()
    }

    async fn wait(&self) -> String {
        loop {
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed.
            let _ = notified.as_mut().enable();
            if let Some(message) = self.take() {
                return message;
            }
            notified.await;
        }
    }
}

/// Per-identity pending-message slots.
#[derive(Debug, Default)]
pub struct Mailboxes {
    slots: Mutex<HashMap<Identity, Arc<Slot>>>,
}

impl Mailboxes {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, identity: &Identity) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(identity) {
            return slot.clone();
        }
        let slot = Arc::new(Slot::default());
        let _ = slots.insert(identity.clone(), slot.clone());
        slot
    }

    /// Try to park `text` for `identity` without waiting.
    pub fn publish(&self, identity: &Identity, text: String) -> PublishOutcome {
        let slot = self.slot(identity);
        {
            let mut pending = slot.pending.lock();
            if pending.is_some() {
                return PublishOutcome::Dropped;
            }
            *pending = Some(text);
        }
        slot.arrived.notify_one();
        PublishOutcome::Accepted
    }

    /// Take the message for `identity`, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout or when `cancel` fires.
    pub async fn consume(
        &self,
        identity: &Identity,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let slot = self.slot(identity);
        // A timeout past the clock's range waits until a message or cancel.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return tokio::select! {
                message = slot.wait() => Some(message),
                () = cancel.cancelled() => None,
            };
        };
        tokio::select! {
            received = tokio::time::timeout_at(deadline, slot.wait()) => received.ok(),
            () = cancel.cancelled() => None,
        }
    }

    /// Whether a message is parked for `identity`. Does not create a slot.
    pub fn has_pending(&self, identity: &str) -> bool {
        let slot = self.slots.lock().get(identity).cloned();
        slot.is_some_and(|s| s.pending.lock().is_some())
    }

    /// Number of slots created so far.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }
}
