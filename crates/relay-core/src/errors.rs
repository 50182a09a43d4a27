//! Frame decoding errors.

use thiserror::Error;

/// A live-connection frame that could not be turned into a [`ChatMessage`].
///
/// [`ChatMessage`]: crate::message::ChatMessage
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame was not a JSON object of string values.
    #[error("invalid message frame: {0}")]
    Json(#[from] serde_json::Error),
    /// A binary frame did not contain UTF-8 text.
    #[error("binary frame is not valid UTF-8 ({len} bytes)")]
    NotUtf8 {
        /// Size of the rejected frame.
        len: usize,
    },
}
