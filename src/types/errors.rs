use thiserror::Error;

use super::bookmark::BookmarkId;

// === ValidationError ===

/// Input rejected before any network call. Messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// URL or title is blank after trimming.
    #[error("Both URL and title are required.")]
    MissingFields,
    /// The URL does not parse as an absolute URI, even with the default scheme.
    #[error("Please enter a valid URL.")]
    InvalidUrl(String),
}

// === StoreError ===

/// Errors reported by the shared bookmark store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The underlying database rejected the operation.
    #[error("Bookmark database error: {0}")]
    Database(String),
    /// The store could not be reached or the request was dropped.
    #[error("Bookmark store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

// === FeedError ===

/// Transport-level change feed failures. Only ever surfaced through the
/// connection health indicator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The receiver fell behind and events were dropped.
    #[error("Change feed lagged, {0} events missed")]
    Lagged(u64),
    /// The transport reported a failure.
    #[error("Change feed transport error: {0}")]
    Transport(String),
}

// === BroadcastError ===

/// Broadcast channel failures. Publishing is best effort, so these are logged only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// The payload could not be encoded for the wire.
    #[error("Broadcast encoding error: {0}")]
    Encoding(String),
}

// === SyncError ===

/// Errors returned to callers of a bookmark session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The add intent failed validation; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The shared store rejected the insert; local state is unchanged.
    #[error("Failed to add bookmark. Please try again. ({0})")]
    Insert(StoreError),
    /// The shared store rejected the delete; local state was reconciled.
    #[error("Failed to delete bookmark: {0}")]
    Delete(StoreError),
    /// A reconciliation fetch failed; local state is unchanged.
    #[error("Failed to refresh bookmarks: {0}")]
    Fetch(StoreError),
    /// The bookmark is not in the session's list.
    #[error("Bookmark not found: {0}")]
    NotFound(BookmarkId),
    /// The identity supplied for a session was blank.
    #[error("Session identity must not be empty")]
    InvalidIdentity,
    /// The session task has stopped.
    #[error("Bookmark session closed")]
    SessionClosed,
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
