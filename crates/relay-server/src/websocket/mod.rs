//! Live WebSocket connections and their session loops.

pub mod connection;
pub mod session;
