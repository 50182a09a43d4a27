//! Client identity newtype.
//!
//! An identity is whatever string the client says it is. It is never
//! validated or authenticated; the relay only uses it as a map key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user name a client connects, polls or sends under.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Identity {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}
