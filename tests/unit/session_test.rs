//! Integration tests for `BookmarkSession`.
//!
//! Sessions run against the real SQLite store, change feed and broadcast hub,
//! with a thin wrapper around the store that counts calls and can be told to
//! fail or to hold deletes until released.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::timeout;

use marksync::channels::{BroadcastHub, ChangeFeedHub, DeletedRecord};
use marksync::database::Database;
use marksync::managers::bookmark_session::{
    BookmarkSession, DeleteOutcome, SessionConfig, SessionHandle, SyncClient,
};
use marksync::services::validation::validate_draft;
use marksync::store::{RemoteStore, SqliteBookmarkStore};
use marksync::types::bookmark::{Bookmark, BookmarkDraft, BookmarkId};
use marksync::types::errors::{StoreError, SyncError, ValidationError};
use marksync::types::identity::Identity;
use marksync::types::settings::SyncSettings;
use marksync::types::status::ConnectionStatus;

const WAIT: Duration = Duration::from_secs(2);

/// Store wrapper with call counters and switchable failures.
struct ScriptedStore {
    inner: SqliteBookmarkStore,
    fetches: AtomicUsize,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    hold_deletes: AtomicBool,
    release: Notify,
}

impl ScriptedStore {
    fn new(inner: SqliteBookmarkStore) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            hold_deletes: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    fn offline() -> StoreError {
        StoreError::Unavailable("scripted failure".to_string())
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn fetch_all(&self, owner: &Identity) -> Result<Vec<Bookmark>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.fetch_all(owner).await
    }

    async fn insert(&self, owner: &Identity, draft: &BookmarkDraft) -> Result<Bookmark, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.insert(owner, draft).await
    }

    async fn delete(&self, owner: &Identity, id: &BookmarkId) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.hold_deletes.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.delete(owner, id).await
    }
}

/// Shared collaborators for every session in one test.
struct Harness {
    store: Arc<ScriptedStore>,
    feed: Arc<ChangeFeedHub>,
    broadcast: Arc<BroadcastHub>,
    settings: SyncSettings,
}

impl Harness {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("Failed to open in-memory database"));
        let feed = Arc::new(ChangeFeedHub::new());
        let inner = SqliteBookmarkStore::new(db, Arc::clone(&feed));
        Self {
            store: Arc::new(ScriptedStore::new(inner)),
            feed,
            broadcast: Arc::new(BroadcastHub::new()),
            settings: SyncSettings::default(),
        }
    }

    fn client(&self) -> SyncClient {
        SyncClient {
            store: self.store.clone(),
            feed: self.feed.clone(),
            broadcast: self.broadcast.clone(),
        }
    }

    /// Seeds a row directly in the store, bypassing any session.
    async fn seed(&self, owner: &Identity, url: &str, title: &str) -> Bookmark {
        let draft = validate_draft(url, title, "https").expect("valid draft");
        self.store.inner.insert(owner, &draft).await.expect("seed insert")
    }

    async fn open(&self, identity: &Identity) -> BookmarkSession {
        let initial = self.store.inner.fetch_all(identity).await.expect("initial fetch");
        let config = SessionConfig::for_identity(identity, &self.settings);
        BookmarkSession::start(identity.clone(), initial, self.client(), config)
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn alice() -> Identity {
    Identity::new("alice").unwrap()
}

async fn wait_items(handle: &SessionHandle, pred: impl FnMut(&Vec<Bookmark>) -> bool) {
    let mut rx = handle.subscribe_items();
    timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for list")
        .expect("session closed");
}

fn has(items: &[Bookmark], id: &BookmarkId) -> bool {
    items.iter().any(|b| &b.id == id)
}

// ─── Config ───

#[test]
fn test_session_config_derives_channel_names() {
    let config = SessionConfig::for_identity(&alice(), &SyncSettings::default());
    assert_eq!(config.feed_channel, "db-changes-alice");
    assert_eq!(config.broadcast_channel, "bookmark-broadcast-alice");
    assert!(!config.broadcast_options.receive_own);
    assert_eq!(config.confirm_window, Duration::from_secs(3));
    assert_eq!(config.default_scheme, "https");
}

// ─── Add ───

/// A scheme-less URL is stored with the default scheme and shown first.
#[tokio::test]
async fn test_add_normalizes_url_and_prepends() {
    let h = Harness::new();
    let older = h.seed(&alice(), "older.io", "Older").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();

    let added = handle.add("example.com", "Example").await.unwrap();
    assert_eq!(added.url, "https://example.com");
    assert_eq!(added.owner, alice());

    let items = handle.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, added.id);
    assert_eq!(items[1].id, older.id);
    assert!(has(&h.store.inner.fetch_all(&alice()).await.unwrap(), &added.id));
}

#[tokio::test]
async fn test_add_rejects_invalid_input_without_store_call() {
    let h = Harness::new();
    let session = h.open(&alice()).await;
    let handle = session.handle();

    let blank = handle.add("   ", "Title").await;
    assert_eq!(blank, Err(SyncError::Validation(ValidationError::MissingFields)));
    let bad = handle.add("https://", "Title").await;
    assert!(matches!(bad, Err(SyncError::Validation(ValidationError::InvalidUrl(_)))));

    assert_eq!(Harness::count(&h.store.inserts), 0);
    assert!(handle.items().is_empty());
}

#[tokio::test]
async fn test_add_failure_leaves_list_unchanged() {
    let h = Harness::new();
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.store.fail_insert.store(true, Ordering::SeqCst);

    let result = handle.add("example.com", "Example").await;
    assert!(matches!(result, Err(SyncError::Insert(_))));
    assert!(handle.items().is_empty());
}

/// An insert in one session reaches its sibling through the broadcast hint.
#[tokio::test]
async fn test_sibling_picks_up_insert_via_broadcast() {
    let h = Harness::new();
    let a = h.open(&alice()).await;
    let b = h.open(&alice()).await;

    let added = a.handle().add("example.com", "Example").await.unwrap();
    wait_items(&b.handle(), |items| has(items, &added.id)).await;
    assert_eq!(b.handle().items()[0].url, "https://example.com");
}

/// Only the sibling refetches; the sender does not hear its own hint.
#[tokio::test]
async fn test_sender_does_not_refetch_on_own_broadcast() {
    let h = Harness::new();
    let a = h.open(&alice()).await;
    let b = h.open(&alice()).await;

    let added = a.handle().add("example.com", "Example").await.unwrap();
    wait_items(&b.handle(), |items| has(items, &added.id)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(Harness::count(&h.store.fetches), 1);
}

#[tokio::test]
async fn test_other_identity_does_not_see_insert() {
    let h = Harness::new();
    let bob = Identity::new("bob").unwrap();
    let a = h.open(&alice()).await;
    let b = h.open(&bob).await;

    a.handle().add("example.com", "Example").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(b.handle().items().is_empty());
    assert_eq!(Harness::count(&h.store.fetches), 0);
}

// ─── Delete ───

/// Two presses inside the window issue exactly one remote delete.
#[tokio::test]
async fn test_two_press_delete_issues_one_remote_delete() {
    let h = Harness::new();
    let item = h.seed(&alice(), "example.com", "Example").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();

    assert_eq!(handle.delete(&item.id).await, Ok(DeleteOutcome::Armed));
    assert!(has(&handle.items(), &item.id), "first press must not remove");
    assert_eq!(Harness::count(&h.store.deletes), 0);

    assert_eq!(handle.delete(&item.id).await, Ok(DeleteOutcome::Deleted));
    assert!(!has(&handle.items(), &item.id));
    assert_eq!(Harness::count(&h.store.deletes), 1);
    assert!(h.store.inner.fetch_all(&alice()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_id_is_not_found() {
    let h = Harness::new();
    let session = h.open(&alice()).await;
    let handle = session.handle();

    let missing = BookmarkId::new("nope");
    assert_eq!(handle.delete(&missing).await, Err(SyncError::NotFound(missing)));
    assert_eq!(Harness::count(&h.store.deletes), 0);
}

/// The sibling learns about the delete from the change feed, without refetching.
#[tokio::test]
async fn test_delete_propagates_to_sibling_via_feed() {
    let h = Harness::new();
    let item = h.seed(&alice(), "example.com", "Example").await;
    let a = h.open(&alice()).await;
    let b = h.open(&alice()).await;

    a.handle().delete(&item.id).await.unwrap();
    a.handle().delete(&item.id).await.unwrap();

    wait_items(&b.handle(), |items| !has(items, &item.id)).await;
    assert_eq!(Harness::count(&h.store.fetches), 0);
}

/// A failed delete is reported and the list is restored from the store.
#[tokio::test]
async fn test_failed_delete_reconciles_list() {
    let h = Harness::new();
    let item = h.seed(&alice(), "example.com", "Example").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.store.fail_delete.store(true, Ordering::SeqCst);

    handle.delete(&item.id).await.unwrap();
    let result = handle.delete(&item.id).await;

    assert!(matches!(result, Err(SyncError::Delete(_))));
    assert!(has(&handle.items(), &item.id), "item should be restored by reconcile");
    assert_eq!(Harness::count(&h.store.fetches), 1);
}

/// When the delete and the follow-up fetch both fail, the item is put back.
#[tokio::test]
async fn test_failed_delete_and_fetch_restores_item() {
    let h = Harness::new();
    let older = h.seed(&alice(), "older.io", "Older").await;
    let item = h.seed(&alice(), "example.com", "Example").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.store.fail_delete.store(true, Ordering::SeqCst);
    h.store.fail_fetch.store(true, Ordering::SeqCst);

    handle.delete(&item.id).await.unwrap();
    let result = handle.delete(&item.id).await;

    assert!(matches!(result, Err(SyncError::Delete(_))));
    assert!(has(&h.store.inner.fetch_all(&alice()).await.unwrap(), &item.id));
    let items = handle.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, item.id);
    assert_eq!(items[1].id, older.id);
    assert_eq!(Harness::count(&h.store.fetches), 1);
}

/// A failed delete of a row already gone from the store leaves it absent.
#[tokio::test]
async fn test_failed_delete_of_row_removed_elsewhere_stays_absent() {
    let h = Harness::new();
    let item = h.seed(&alice(), "example.com", "Example").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.store.hold_deletes.store(true, Ordering::SeqCst);
    h.store.fail_delete.store(true, Ordering::SeqCst);

    handle.delete(&item.id).await.unwrap();
    let confirming = tokio::spawn({
        let handle = handle.clone();
        let id = item.id.clone();
        async move { handle.delete(&id).await }
    });
    while Harness::count(&h.store.deletes) == 0 {
        tokio::task::yield_now().await;
    }
    h.store.inner.delete(&alice(), &item.id).await.unwrap();
    h.store.release.notify_one();

    let result = confirming.await.unwrap();
    assert!(matches!(result, Err(SyncError::Delete(_))));
    assert!(!has(&handle.items(), &item.id));
    assert!(h.store.inner.fetch_all(&alice()).await.unwrap().is_empty());
    assert_eq!(Harness::count(&h.store.fetches), 1);
}

/// Presses while a delete is running are ignored and never issue a second call.
#[tokio::test]
async fn test_press_during_delete_is_in_flight() {
    let h = Harness::new();
    let item = h.seed(&alice(), "example.com", "Example").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.store.hold_deletes.store(true, Ordering::SeqCst);

    handle.delete(&item.id).await.unwrap();
    let confirming = tokio::spawn({
        let handle = handle.clone();
        let id = item.id.clone();
        async move { handle.delete(&id).await }
    });
    while Harness::count(&h.store.deletes) == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(handle.delete(&item.id).await, Ok(DeleteOutcome::InFlight));

    h.store.release.notify_one();
    assert_eq!(confirming.await.unwrap(), Ok(DeleteOutcome::Deleted));
    assert_eq!(Harness::count(&h.store.deletes), 1);
}

/// A second press after the window has elapsed only re-arms.
#[tokio::test(start_paused = true)]
async fn test_arm_expires_after_window() {
    let h = Harness::new();
    let item = h.seed(&alice(), "example.com", "Example").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();

    assert_eq!(handle.delete(&item.id).await, Ok(DeleteOutcome::Armed));
    tokio::time::advance(Duration::from_millis(3_001)).await;
    assert_eq!(handle.delete(&item.id).await, Ok(DeleteOutcome::Armed));
    assert_eq!(Harness::count(&h.store.deletes), 0);

    tokio::time::advance(Duration::from_millis(1_000)).await;
    assert_eq!(handle.delete(&item.id).await, Ok(DeleteOutcome::Deleted));
    assert_eq!(Harness::count(&h.store.deletes), 1);
}

/// A delete event for a row the session does not own is never applied.
#[tokio::test]
async fn test_foreign_delete_event_is_ignored() {
    let h = Harness::new();
    let bob = Identity::new("bob").unwrap();
    let item = h.seed(&bob, "example.com", "Example").await;
    let b = h.open(&bob).await;
    let mut status = b.handle().subscribe_status();
    timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Connected))
        .await
        .unwrap()
        .unwrap();

    h.feed.publish_delete(DeletedRecord {
        id: item.id.clone(),
        owner: alice(),
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(has(&b.handle().items(), &item.id));
}

// ─── Reconcile ───

#[tokio::test]
async fn test_reconcile_picks_up_rows_missed_by_hints() {
    let h = Harness::new();
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.seed(&alice(), "a.io", "A").await;
    h.seed(&alice(), "b.io", "B").await;

    assert_eq!(handle.reconcile().await, Ok(2));
    assert_eq!(handle.items().len(), 2);
    assert_eq!(handle.items()[0].title, "B");
}

#[tokio::test]
async fn test_failed_reconcile_keeps_list() {
    let h = Harness::new();
    let item = h.seed(&alice(), "a.io", "A").await;
    let session = h.open(&alice()).await;
    let handle = session.handle();
    h.store.fail_fetch.store(true, Ordering::SeqCst);

    assert!(matches!(handle.reconcile().await, Err(SyncError::Fetch(_))));
    assert_eq!(handle.items().len(), 1);
    assert_eq!(handle.items()[0].id, item.id);
}

// ─── Health and lifecycle ───

#[tokio::test]
async fn test_status_tracks_feed_health() {
    let h = Harness::new();
    let session = h.open(&alice()).await;
    let handle = session.handle();
    let mut status = handle.subscribe_status();

    timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Connected))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.status().label(), "Real-time sync active");

    h.feed.report_fault("socket reset");
    timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Error))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.status().label(), "Real-time error, check logs");
}

/// Shutdown releases both subscriptions; later intents report a closed session.
#[tokio::test]
async fn test_shutdown_releases_subscriptions() {
    let h = Harness::new();
    let a = h.open(&alice()).await;
    let b = h.open(&alice()).await;
    assert_eq!(h.feed.active_subscriptions(), 2);
    assert_eq!(h.broadcast.active_subscriptions(), 2);

    let handle = a.handle();
    a.shutdown().await;
    assert_eq!(h.feed.active_subscriptions(), 1);
    assert_eq!(h.broadcast.active_subscriptions(), 1);
    assert_eq!(handle.reconcile().await, Err(SyncError::SessionClosed));

    b.shutdown().await;
    assert_eq!(h.feed.active_subscriptions(), 0);
    assert_eq!(h.broadcast.active_subscriptions(), 0);
}

/// Dropping a session without shutdown still releases both subscriptions.
#[tokio::test]
async fn test_dropped_session_releases_subscriptions() {
    let h = Harness::new();
    let session = h.open(&alice()).await;
    let handle = session.handle();
    assert_eq!(h.feed.active_subscriptions(), 1);
    assert_eq!(h.broadcast.active_subscriptions(), 1);

    drop(session);
    timeout(WAIT, async {
        while h.feed.active_subscriptions() + h.broadcast.active_subscriptions() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("subscriptions still held after drop");

    assert_eq!(handle.reconcile().await, Err(SyncError::SessionClosed));
}
