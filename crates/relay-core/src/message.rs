//! Live-connection message record.
//!
//! On the wire a message is a flat JSON object of string values. Two keys
//! are reserved: `from` names the sender and `to` names the recipient.
//! Every other key is carried through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::FrameError;
use crate::identity::Identity;

/// A message exchanged over a live connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender identity. Absent on the wire means the empty identity.
    #[serde(default)]
    pub from: Identity,
    /// Recipient identity. Absent on the wire means the empty identity.
    #[serde(default)]
    pub to: Identity,
    /// Remaining fields, forwarded opaquely.
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl ChatMessage {
    /// Create a message with no extra fields.
    pub fn new(from: impl Into<Identity>, to: impl Into<Identity>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add an opaque field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up an opaque field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Decode a text frame.
    pub fn from_text(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a binary frame carrying UTF-8 JSON.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(data).map_err(|_| FrameError::NotUtf8 { len: data.len() })?;
        Self::from_text(text)
    }

    /// Encode for sending over a live connection.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}
