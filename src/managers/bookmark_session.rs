//! Bookmark session for marksync.
//!
//! A session is one running client (one open tab) of an identity. It runs as a
//! single tokio task that owns the session's [`BookmarkList`], delete
//! confirmation state and health monitor, and handles, one at a time:
//!
//! - intents from the presentation layer (`add`, `delete`, `reconcile`),
//! - delete events from the store's change feed (applied by id, no fetch),
//! - `item-added` hints from sibling sessions (answered with a full fetch),
//! - completions of its own network calls, which run as spawned tasks.
//!
//! Both channel subscriptions are taken when the session starts and released
//! when its task ends, however it ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::broadcast::{BroadcastChannel, BroadcastEvent, BroadcastMessage, BroadcastOptions, MemberId};
use crate::channels::change_feed::{ChangeFeed, FeedMessage};
use crate::channels::subscription::Subscription;
use crate::managers::bookmark_list::{BookmarkList, BookmarkListTrait};
use crate::managers::delete_confirmation::{ConfirmState, DeleteConfirmation, PressOutcome};
use crate::services::health_monitor::HealthMonitor;
use crate::services::reconciler::{FetchTicket, ReconcileOutcome, Reconciler};
use crate::services::validation::validate_draft;
use crate::store::RemoteStore;
use crate::types::bookmark::{Bookmark, BookmarkId};
use crate::types::errors::{StoreError, SyncError};
use crate::types::identity::Identity;
use crate::types::settings::SyncSettings;
use crate::types::status::ConnectionStatus;

/// The collaborators a session talks to. Built once per process by
/// [`crate::app::App`] and cloned into each session.
#[derive(Clone)]
pub struct SyncClient {
    pub store: Arc<dyn RemoteStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub broadcast: Arc<dyn BroadcastChannel>,
}

/// Per-session channel names and behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub feed_channel: String,
    pub broadcast_channel: String,
    pub broadcast_options: BroadcastOptions,
    pub confirm_window: Duration,
    pub default_scheme: String,
}

impl SessionConfig {
    /// Derives the channel names for `identity` from the settings.
    pub fn for_identity(identity: &Identity, settings: &SyncSettings) -> Self {
        Self {
            feed_channel: format!("{}-{}", settings.channels.change_feed_prefix, identity),
            broadcast_channel: format!("{}-{}", settings.channels.broadcast_prefix, identity),
            broadcast_options: BroadcastOptions {
                receive_own: settings.channels.receive_own_broadcasts,
            },
            confirm_window: Duration::from_millis(settings.delete_confirm_window_ms),
            default_scheme: settings.default_url_scheme.clone(),
        }
    }
}

/// Result of a delete intent that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// First press; press again inside the window to delete.
    Armed,
    /// Removed locally and from the shared store.
    Deleted,
    /// A delete for this item is already running; the press was ignored.
    InFlight,
}

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
    Add {
        url: String,
        title: String,
        reply: Reply<Bookmark>,
    },
    Delete {
        id: BookmarkId,
        reply: Reply<DeleteOutcome>,
    },
    Reconcile {
        reply: Reply<usize>,
    },
}

enum Completion {
    Inserted {
        result: Result<Bookmark, StoreError>,
        reply: Reply<Bookmark>,
    },
    Deleted {
        removed: Bookmark,
        result: Result<(), StoreError>,
        reply: Reply<DeleteOutcome>,
    },
    Fetched {
        ticket: FetchTicket,
        result: Result<Vec<Bookmark>, StoreError>,
        followup: Followup,
    },
}

/// What to do once a reconciliation fetch has been applied.
enum Followup {
    Nothing,
    /// `removed` is put back if the fetch fails too.
    DeleteFailed {
        removed: Bookmark,
        error: StoreError,
        reply: Reply<DeleteOutcome>,
    },
    Requested {
        reply: Reply<usize>,
    },
}

/// Cloneable front end used by the presentation layer.
#[derive(Clone)]
pub struct SessionHandle {
    identity: Identity,
    commands: mpsc::UnboundedSender<Command>,
    items: watch::Receiver<Vec<Bookmark>>,
    status: watch::Receiver<ConnectionStatus>,
}

impl SessionHandle {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Snapshot of the session's list, newest first.
    pub fn items(&self) -> Vec<Bookmark> {
        self.items.borrow().clone()
    }

    /// Change stream of the session's list.
    pub fn subscribe_items(&self) -> watch::Receiver<Vec<Bookmark>> {
        self.items.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Validates and stores a new bookmark, then hints sibling sessions.
    pub async fn add(&self, url: &str, title: &str) -> Result<Bookmark, SyncError> {
        let (url, title) = (url.to_string(), title.to_string());
        self.request(|reply| Command::Add { url, title, reply }).await
    }

    /// Presses delete on `id`. The second press inside the confirm window deletes.
    pub async fn delete(&self, id: &BookmarkId) -> Result<DeleteOutcome, SyncError> {
        let id = id.clone();
        self.request(|reply| Command::Delete { id, reply }).await
    }

    /// Forces a full re-read. Returns the list length afterwards.
    pub async fn reconcile(&self) -> Result<usize, SyncError> {
        self.request(|reply| Command::Reconcile { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)?
    }
}

/// A running session. Dropping it stops the session task.
pub struct BookmarkSession {
    handle: SessionHandle,
    member: MemberId,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl BookmarkSession {
    /// Hydrates a session with `initial` and subscribes both channels.
    ///
    /// Must be called inside a tokio runtime. Subscriptions are registered
    /// before this returns, so nothing published afterwards is missed.
    pub fn start(
        identity: Identity,
        initial: Vec<Bookmark>,
        client: SyncClient,
        config: SessionConfig,
    ) -> Self {
        let member = Uuid::new_v4();
        let list = BookmarkList::from_initial(initial);

        let (items_tx, items_rx) = watch::channel(list.items().to_vec());
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let feed = client.feed.subscribe_deletes(&config.feed_channel, &identity);
        let broadcasts =
            client
                .broadcast
                .subscribe(&config.broadcast_channel, member, config.broadcast_options);

        let worker = SessionWorker {
            identity: identity.clone(),
            member,
            reconciler: Reconciler::new(Arc::clone(&client.store), identity.clone()),
            confirmation: DeleteConfirmation::new(config.confirm_window),
            config,
            client,
            list,
            health: HealthMonitor::new(),
            items_tx,
            status_tx,
            completions: completions_tx,
            deferred: Vec::new(),
        };
        let inbox = Inbox {
            commands: commands_rx,
            completions: completions_rx,
            shutdown: shutdown_rx,
            feed,
            broadcasts,
        };
        let task = tokio::spawn(worker.run(inbox));

        Self {
            handle: SessionHandle {
                identity,
                commands: commands_tx,
                items: items_rx,
                status: status_rx,
            },
            member,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// This session's member id on the broadcast channel.
    pub fn member_id(&self) -> MemberId {
        self.member
    }

    /// Stops the session and waits until its subscriptions are released.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!(target: "marksync.session", error = %err, "session task ended abnormally");
        }
    }
}

impl Drop for BookmarkSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    shutdown: oneshot::Receiver<()>,
    feed: Subscription<FeedMessage>,
    broadcasts: Subscription<BroadcastMessage>,
}

struct SessionWorker {
    identity: Identity,
    member: MemberId,
    config: SessionConfig,
    client: SyncClient,
    list: BookmarkList,
    confirmation: DeleteConfirmation,
    health: HealthMonitor,
    reconciler: Reconciler,
    items_tx: watch::Sender<Vec<Bookmark>>,
    status_tx: watch::Sender<ConnectionStatus>,
    completions: mpsc::UnboundedSender<Completion>,
    /// Followups of fetches overtaken by a newer one, resolved with its outcome.
    deferred: Vec<Followup>,
}

impl SessionWorker {
    async fn run(mut self, mut inbox: Inbox) {
        info!(
            target: "marksync.session",
            identity = %self.identity,
            member = %self.member,
            items = self.list.len(),
            "session started"
        );

        loop {
            tokio::select! {
                _ = &mut inbox.shutdown => break,
                command = inbox.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(message) = inbox.feed.recv() => self.handle_feed(message),
                Some(message) = inbox.broadcasts.recv() => self.handle_broadcast(message),
                Some(done) = inbox.completions.recv() => self.handle_completion(done),
            }
        }

        inbox.feed.unsubscribe();
        inbox.broadcasts.unsubscribe();
        info!(target: "marksync.session", member = %self.member, "session stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Add { url, title, reply } => self.add(url, title, reply),
            Command::Delete { id, reply } => self.delete(id, reply),
            Command::Reconcile { reply } => self.start_fetch(Followup::Requested { reply }),
        }
    }

    fn add(&mut self, url: String, title: String, reply: Reply<Bookmark>) {
        let draft = match validate_draft(&url, &title, &self.config.default_scheme) {
            Ok(draft) => draft,
            Err(err) => {
                debug!(target: "marksync.session", error = %err, "add rejected by validation");
                let _ = reply.send(Err(err.into()));
                return;
            }
        };

        let store = Arc::clone(&self.client.store);
        let owner = self.identity.clone();
        let done = self.completions.clone();
        tokio::spawn(async move {
            let result = store.insert(&owner, &draft).await;
            let _ = done.send(Completion::Inserted { result, reply });
        });
    }

    fn delete(&mut self, id: BookmarkId, reply: Reply<DeleteOutcome>) {
        let now = Instant::now();
        self.confirmation.sweep(now);
        if self.confirmation.state(&id, now) == ConfirmState::Executing {
            let _ = reply.send(Ok(DeleteOutcome::InFlight));
            return;
        }
        let Some(removed) = self.list.get(&id).cloned() else {
            self.confirmation.disarm(&id);
            let _ = reply.send(Err(SyncError::NotFound(id)));
            return;
        };

        match self.confirmation.press(&id, now) {
            PressOutcome::Armed => {
                debug!(
                    target: "marksync.session",
                    id = %id,
                    armed = self.confirmation.armed_count(),
                    "delete armed"
                );
                let _ = reply.send(Ok(DeleteOutcome::Armed));
            }
            PressOutcome::InFlight => {
                let _ = reply.send(Ok(DeleteOutcome::InFlight));
            }
            PressOutcome::Confirmed => {
                self.list.remove_by_id(&id);
                self.publish_items();

                let store = Arc::clone(&self.client.store);
                let owner = self.identity.clone();
                let done = self.completions.clone();
                tokio::spawn(async move {
                    let result = store.delete(&owner, &id).await;
                    let _ = done.send(Completion::Deleted {
                        removed,
                        result,
                        reply,
                    });
                });
            }
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Inserted { result, reply } => match result {
                Ok(bookmark) => {
                    self.list.insert_if_absent(bookmark.clone());
                    self.publish_items();
                    self.announce_insert(bookmark.id.clone());
                    let _ = reply.send(Ok(bookmark));
                }
                Err(err) => {
                    warn!(target: "marksync.session", error = %err, "insert failed");
                    let _ = reply.send(Err(SyncError::Insert(err)));
                }
            },
            Completion::Deleted {
                removed,
                result,
                reply,
            } => {
                self.confirmation.finish(&removed.id);
                match result {
                    Ok(()) => {
                        debug!(target: "marksync.session", id = %removed.id, "delete confirmed by store");
                        let _ = reply.send(Ok(DeleteOutcome::Deleted));
                    }
                    Err(error) => {
                        warn!(target: "marksync.session", id = %removed.id, error = %error, "delete failed, reconciling");
                        self.start_fetch(Followup::DeleteFailed {
                            removed,
                            error,
                            reply,
                        });
                    }
                }
            }
            Completion::Fetched {
                ticket,
                result,
                followup,
            } => self.finish_fetch(ticket, result, followup),
        }
    }

    fn handle_feed(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Status(state) => {
                debug!(target: "marksync.feed", channel = %self.config.feed_channel, ?state, "channel status");
                if let Some(status) = self.health.apply(state) {
                    info!(target: "marksync.feed", ?status, "real-time status changed");
                    self.status_tx.send_replace(status);
                }
            }
            FeedMessage::Deleted(event) => {
                let id = event.old.id;
                self.confirmation.disarm(&id);
                if self.list.remove_by_id(&id) {
                    debug!(target: "marksync.feed", id = %id, "removed bookmark deleted elsewhere");
                    self.publish_items();
                }
            }
        }
    }

    fn handle_broadcast(&mut self, message: BroadcastMessage) {
        match message.event {
            BroadcastEvent::ItemAdded { id } => {
                debug!(target: "marksync.broadcast", id = %id, from = %message.from, "sibling added a bookmark, fetching");
                self.start_fetch(Followup::Nothing);
            }
        }
    }

    fn start_fetch(&mut self, followup: Followup) {
        let (ticket, fetch) = self.reconciler.begin();
        let done = self.completions.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            let _ = done.send(Completion::Fetched {
                ticket,
                result,
                followup,
            });
        });
    }

    fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Bookmark>, StoreError>,
        followup: Followup,
    ) {
        let outcome = self.reconciler.apply(ticket, result, &mut self.list);
        match &outcome {
            ReconcileOutcome::Applied(count) => {
                debug!(target: "marksync.session", count, "reconciled with store");
                self.publish_items();
            }
            ReconcileOutcome::Stale => {
                debug!(target: "marksync.session", ?ticket, "dropped stale fetch");
                if !matches!(followup, Followup::Nothing) {
                    self.deferred.push(followup);
                }
                return;
            }
            ReconcileOutcome::Failed(err) => {
                warn!(target: "marksync.session", error = %err, "reconciliation fetch failed");
            }
        }

        let deferred = std::mem::take(&mut self.deferred);
        for followup in std::iter::once(followup).chain(deferred) {
            self.resolve(followup, &outcome);
        }
    }

    /// Answers a followup once a fetch has either been applied or has failed.
    fn resolve(&mut self, followup: Followup, outcome: &ReconcileOutcome) {
        match followup {
            Followup::Nothing => {}
            Followup::DeleteFailed {
                removed,
                error,
                reply,
            } => {
                if matches!(outcome, ReconcileOutcome::Failed(_)) && self.list.restore(removed) {
                    debug!(target: "marksync.session", "restored bookmark after failed delete");
                    self.publish_items();
                }
                let _ = reply.send(Err(SyncError::Delete(error)));
            }
            Followup::Requested { reply } => {
                let result = match outcome {
                    ReconcileOutcome::Applied(count) => Ok(*count),
                    ReconcileOutcome::Stale => Ok(self.list.len()),
                    ReconcileOutcome::Failed(err) => Err(SyncError::Fetch(err.clone())),
                };
                let _ = reply.send(result);
            }
        }
    }

    /// Fire-and-forget `item-added` hint. Failure never touches local state.
    fn announce_insert(&self, id: BookmarkId) {
        let broadcast = Arc::clone(&self.client.broadcast);
        let channel = self.config.broadcast_channel.clone();
        let member = self.member;
        tokio::spawn(async move {
            if let Err(err) = broadcast
                .send(&channel, member, BroadcastEvent::ItemAdded { id })
                .await
            {
                warn!(target: "marksync.broadcast", channel = %channel, error = %err, "item-added broadcast failed");
            }
        });
    }

    fn publish_items(&self) {
        self.items_tx.send_replace(self.list.items().to_vec());
    }
}
