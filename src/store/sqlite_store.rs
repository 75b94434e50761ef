//! Reference shared store for marksync.
//!
//! Implements [`RemoteStore`] on top of SQLite via `rusqlite` and publishes
//! every successful delete on the [`ChangeFeedHub`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use super::RemoteStore;
use crate::channels::change_feed::{ChangeFeedHub, DeletedRecord};
use crate::database::connection::Database;
use crate::types::bookmark::{Bookmark, BookmarkDraft, BookmarkId};
use crate::types::errors::StoreError;
use crate::types::identity::Identity;

/// Bookmark store backed by a shared SQLite connection.
pub struct SqliteBookmarkStore {
    db: Arc<Database>,
    feed: Arc<ChangeFeedHub>,
}

impl SqliteBookmarkStore {
    /// Creates a store over `db` that reports deletions on `feed`.
    pub fn new(db: Arc<Database>, feed: Arc<ChangeFeedHub>) -> Self {
        Self { db, feed }
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db.connection();
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let millis: i64 = row.get(4)?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, millis))?;
        Ok(Bookmark {
            id: BookmarkId::new(row.get::<_, String>(0)?),
            owner: Identity::from_store(row.get::<_, String>(1)?),
            url: row.get(2)?,
            title: row.get(3)?,
            created_at,
        })
    }
}

#[async_trait]
impl RemoteStore for SqliteBookmarkStore {
    async fn fetch_all(&self, owner: &Identity) -> Result<Vec<Bookmark>, StoreError> {
        let owner = owner.clone();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, url, title, created_at FROM bookmarks \
                 WHERE owner = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![owner.as_str()], Self::row_to_bookmark)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    async fn insert(&self, owner: &Identity, draft: &BookmarkDraft) -> Result<Bookmark, StoreError> {
        let now = Utc::now().timestamp_millis();
        let created_at = DateTime::<Utc>::from_timestamp_millis(now)
            .ok_or_else(|| StoreError::Database(format!("timestamp out of range: {}", now)))?;
        let bookmark = Bookmark {
            id: BookmarkId::generate(),
            url: draft.url().to_string(),
            title: draft.title().to_string(),
            created_at,
            owner: owner.clone(),
        };

        let row = bookmark.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO bookmarks (id, owner, url, title, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id.as_str(), row.owner.as_str(), row.url, row.title, now],
            )?;
            Ok(())
        })
        .await?;

        debug!(target: "marksync.store", id = %bookmark.id, owner = %owner, "bookmark inserted");
        Ok(bookmark)
    }

    async fn delete(&self, owner: &Identity, id: &BookmarkId) -> Result<(), StoreError> {
        let (row_owner, row_id) = (owner.clone(), id.clone());
        let affected = self
            .run_blocking(move |conn| {
                let affected = conn.execute(
                    "DELETE FROM bookmarks WHERE id = ?1 AND owner = ?2",
                    params![row_id.as_str(), row_owner.as_str()],
                )?;
                Ok(affected)
            })
            .await?;

        debug!(target: "marksync.store", id = %id, owner = %owner, affected, "bookmark delete executed");
        if affected > 0 {
            self.feed.publish_delete(DeletedRecord {
                id: id.clone(),
                owner: owner.clone(),
            });
        }
        Ok(())
    }
}
