//! App core for marksync.
//!
//! Owns the process-wide collaborators (shared store, change feed, broadcast
//! hub) and hands them to each session it opens. Constructed once per process;
//! nothing here is a global.

use std::sync::Arc;

use tracing::info;

use crate::channels::broadcast::BroadcastHub;
use crate::channels::change_feed::ChangeFeedHub;
use crate::database::connection::Database;
use crate::managers::bookmark_session::{BookmarkSession, SessionConfig, SyncClient};
use crate::store::{RemoteStore, SqliteBookmarkStore};
use crate::types::bookmark::Bookmark;
use crate::types::errors::{StoreError, SyncError};
use crate::types::identity::Identity;
use crate::types::settings::SyncSettings;

/// Central application struct holding the shared collaborators.
pub struct App {
    pub db: Arc<Database>,
    pub feed: Arc<ChangeFeedHub>,
    pub broadcast: Arc<BroadcastHub>,
    store: Arc<SqliteBookmarkStore>,
    settings: SyncSettings,
}

impl App {
    /// Opens the database named in `settings` (in memory when unset) and wires
    /// the store to a fresh change feed and broadcast hub.
    pub fn new(settings: SyncSettings) -> Result<Self, StoreError> {
        let db = match &settings.database_path {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        let db = Arc::new(db);
        let feed = Arc::new(ChangeFeedHub::new());
        let broadcast = Arc::new(BroadcastHub::new());
        let store = Arc::new(SqliteBookmarkStore::new(Arc::clone(&db), Arc::clone(&feed)));

        info!(
            target: "marksync.app",
            database = settings.database_path.as_deref().unwrap_or(":memory:"),
            "app initialised"
        );

        Ok(Self {
            db,
            feed,
            broadcast,
            store,
            settings,
        })
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Collaborators for a new session.
    pub fn client(&self) -> SyncClient {
        SyncClient {
            store: self.store.clone(),
            feed: self.feed.clone(),
            broadcast: self.broadcast.clone(),
        }
    }

    /// The list a freshly loaded page starts from.
    pub async fn initial_bookmarks(&self, identity: &Identity) -> Result<Vec<Bookmark>, SyncError> {
        self.store
            .fetch_all(identity)
            .await
            .map_err(SyncError::Fetch)
    }

    /// Loads `identity`'s bookmarks and starts a session on them.
    pub async fn open_session(&self, identity: Identity) -> Result<BookmarkSession, SyncError> {
        let initial = self.initial_bookmarks(&identity).await?;
        let config = SessionConfig::for_identity(&identity, &self.settings);
        Ok(BookmarkSession::start(identity, initial, self.client(), config))
    }
}
