use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

/// The authenticated user a session acts for. Immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps an authenticated user id. Blank ids are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, SyncError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SyncError::InvalidIdentity);
        }
        Ok(Self(id))
    }

    /// Owner column of a stored row, already validated on insert.
    pub(crate) fn from_store(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
