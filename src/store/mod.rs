//! Shared bookmark store collaborator.
//!
//! Every operation is scoped to an [`Identity`]; a store never returns or
//! removes rows belonging to another owner.

pub mod sqlite_store;

use async_trait::async_trait;

use crate::types::bookmark::{Bookmark, BookmarkDraft, BookmarkId};
use crate::types::errors::StoreError;
use crate::types::identity::Identity;

pub use sqlite_store::SqliteBookmarkStore;

/// Authoritative store shared by all sessions of an identity.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All of `owner`'s bookmarks, newest first.
    async fn fetch_all(&self, owner: &Identity) -> Result<Vec<Bookmark>, StoreError>;

    /// Inserts a bookmark and returns the stored record with its assigned id and timestamp.
    async fn insert(&self, owner: &Identity, draft: &BookmarkDraft) -> Result<Bookmark, StoreError>;

    /// Deletes `id` if it belongs to `owner`. Deleting a missing row is not an error.
    async fn delete(&self, owner: &Identity, id: &BookmarkId) -> Result<(), StoreError>;
}
