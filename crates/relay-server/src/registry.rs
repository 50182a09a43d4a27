//! Identity → live connection registry.
//!
//! One lock guards the whole map. Critical sections only touch the map;
//! callers get an `Arc` handle back and write to it after the lock is gone.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relay_core::Identity;

use crate::websocket::connection::LiveConnection;

/// Tracks the single live connection registered for each identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Identity, Arc<LiveConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under its identity, replacing any existing entry.
    ///
    /// The superseded connection is returned but left open.
    pub fn register(&self, connection: Arc<LiveConnection>) -> Option<Arc<LiveConnection>> {
        let identity = connection.identity().clone();
        self.connections.write().insert(identity, connection)
    }

    /// The connection currently registered for `identity`.
    pub fn lookup(&self, identity: &str) -> Option<Arc<LiveConnection>> {
        self.connections.read().get(identity).cloned()
    }

    /// Remove whatever is registered for `identity`. Idempotent.
    pub fn remove(&self, identity: &str) -> Option<Arc<LiveConnection>> {
        self.connections.write().remove(identity)
    }

    /// Remove the entry for `identity` only if it is still `connection_id`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove_if_current(&self, identity: &str, connection_id: &str) -> bool {
        let mut conns = self.connections.write();
        match conns.get(identity) {
            Some(current) if current.id() == connection_id => {
                let _ = conns.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}
