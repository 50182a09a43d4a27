//! Live-path message routing.
//!
//! A message goes to the live connection of its recipient and back to the
//! live connection of its sender. Parties without a registered connection
//! are skipped; nothing is parked in a mailbox from here.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use metrics::counter;
use relay_core::{ChatMessage, FrameError};
use tracing::{debug, warn};

use crate::metrics::{ROUTE_DELIVERIES_TOTAL, WS_FRAMES_DROPPED_TOTAL};
use crate::registry::ConnectionRegistry;
use crate::websocket::connection::SendOutcome;

/// What happened to one party's copy of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued on the party's live connection.
    Delivered,
    /// The party has no live connection.
    Offline,
    /// The party's outbound queue was full.
    Dropped,
    /// The party's connection is dead and was told to close.
    Failed,
}

impl RouteOutcome {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Offline => "offline",
            Self::Dropped => "dropped",
            Self::Failed => "failed",
        }
    }
}

/// Outcome for both parties of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteReport {
    /// Echo back to the sender.
    pub sender: RouteOutcome,
    /// Delivery to the recipient. Same as `sender` when both are one identity.
    pub recipient: RouteOutcome,
}

/// Routes decoded messages over the live path.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `message` to its sender and recipient, if they are connected.
    pub fn route(&self, message: &ChatMessage) -> Result<RouteReport, FrameError> {
        let frame = Utf8Bytes::from(message.to_json()?);

        let sender = self.deliver(&message.from, &frame);
        let recipient = if message.to == message.from {
            sender
        } else {
            self.deliver(&message.to, &frame)
        };

        debug!(
            from = %message.from,
            to = %message.to,
            sender = sender.as_str(),
            recipient = recipient.as_str(),
            "message routed"
        );
        Ok(RouteReport { sender, recipient })
    }

    fn deliver(&self, identity: &str, frame: &Utf8Bytes) -> RouteOutcome {
        let Some(connection) = self.registry.lookup(identity) else {
            counter!(ROUTE_DELIVERIES_TOTAL, "outcome" => RouteOutcome::Offline.as_str())
                .increment(1);
            return RouteOutcome::Offline;
        };

        let outcome = match connection.send(frame.clone()) {
            SendOutcome::Queued => RouteOutcome::Delivered,
            SendOutcome::Full => {
                warn!(identity, connection_id = connection.id(), "outbound queue full, dropping frame");
                counter!(WS_FRAMES_DROPPED_TOTAL).increment(1);
                RouteOutcome::Dropped
            }
            SendOutcome::Closed => {
                debug!(identity, connection_id = connection.id(), "connection writer gone, terminating");
                connection.terminate();
                RouteOutcome::Failed
            }
        };
        counter!(ROUTE_DELIVERIES_TOTAL, "outcome" => outcome.as_str()).increment(1);
        outcome
    }
}
