//! # relay-server
//!
//! Axum HTTP + `WebSocket` message relay.
//!
//! - Live path: `/ws` sessions registered in a [`ConnectionRegistry`], with
//!   each decoded message routed to the sender (echo) and the recipient
//! - Fallback path: `/send` publishes into a capacity-one [`Mailboxes`] slot,
//!   `/poll` waits on it with a timeout
//! - The two paths never bridge: a live message is not parked in a mailbox
//! - Health and Prometheus metrics endpoints, optional static assets
//! - Graceful shutdown via `CancellationToken`
//!
//! [`ConnectionRegistry`]: registry::ConnectionRegistry
//! [`Mailboxes`]: mailbox::Mailboxes

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod errors;
pub mod health;
pub mod mailbox;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod websocket;
