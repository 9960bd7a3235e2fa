//! Typed channel identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of one addressable communication line (e.g. `rs485-1`).
///
/// Derived from the last segment of the device path, so it never contains
/// `/` or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Validate and wrap a channel identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyChannelId`] for an empty string and
    /// [`ValidationError::InvalidChannelId`] when it contains `/` or whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::EmptyChannelId);
        }
        if value.contains('/') || value.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidChannelId(value));
        }
        Ok(Self(value))
    }

    /// Derive the identifier from a device path (`/dev/rs485-1` → `rs485-1`).
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the last path segment is empty.
    pub fn from_path(path: &str) -> Result<Self, ValidationError> {
        let segment = path.trim().rsplit('/').next().unwrap_or_default();
        Self::new(segment)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}
