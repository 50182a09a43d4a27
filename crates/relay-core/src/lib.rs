//! # relay-core
//!
//! Shared vocabulary for the relay crates:
//!
//! - **Identity**: [`Identity`] newtype for the client-supplied user name
//! - **Messages**: [`ChatMessage`] record with reserved `from`/`to` fields
//! - **Errors**: [`FrameError`] for frames that fail to decode
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod identity;
pub mod logging;
pub mod message;

pub use errors::FrameError;
pub use identity::Identity;
pub use message::ChatMessage;
