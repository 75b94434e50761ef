//! Change feed carrying deletions from the shared store.
//!
//! Deletion events are the only thing sessions take from this feed: insert
//! notifications of the backing store are not reliably delivered, so inserts
//! travel over the broadcast channel instead.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::subscription::{Subscription, SubscriptionTracker};
use crate::types::bookmark::BookmarkId;
use crate::types::errors::FeedError;
use crate::types::identity::Identity;
use crate::types::status::ChannelState;

/// Table whose deletions are published on the feed.
pub const BOOKMARKS_TABLE: &str = "bookmarks";

const DEFAULT_CAPACITY: usize = 256;

/// Previous state of a deleted row, as far as the feed reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: BookmarkId,
    #[serde(rename = "user_id")]
    pub owner: Identity,
}

/// A single deletion observed on the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEvent {
    pub table: String,
    pub old: DeletedRecord,
}

/// Messages delivered to a change feed subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Status(ChannelState),
    Deleted(DeleteEvent),
}

/// Event source for deletion notifications.
pub trait ChangeFeed: Send + Sync {
    /// Subscribes to deletions of `owner`'s bookmarks on `channel`.
    ///
    /// The first message is always a status; events for other owners are never
    /// delivered.
    fn subscribe_deletes(&self, channel: &str, owner: &Identity) -> Subscription<FeedMessage>;
}

#[derive(Debug, Clone)]
enum FeedSignal {
    Change(DeleteEvent),
    Fault(FeedError),
}

/// In-process change feed fed by the reference store.
pub struct ChangeFeedHub {
    sender: broadcast::Sender<FeedSignal>,
    tracker: SubscriptionTracker,
}

impl ChangeFeedHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a hub whose subscribers lag after `capacity` undelivered events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            tracker: SubscriptionTracker::new(),
        }
    }

    /// Announces that `record` was deleted from the bookmarks table.
    pub fn publish_delete(&self, record: DeletedRecord) {
        debug!(target: "marksync.feed", id = %record.id, "publishing delete event");
        let event = DeleteEvent {
            table: BOOKMARKS_TABLE.to_string(),
            old: record,
        };
        // No subscribers is not an error for the feed.
        let _ = self.sender.send(FeedSignal::Change(event));
    }

    /// Reports a transport failure to every subscriber.
    pub fn report_fault(&self, reason: impl Into<String>) {
        let _ = self
            .sender
            .send(FeedSignal::Fault(FeedError::Transport(reason.into())));
    }

    pub fn active_subscriptions(&self) -> usize {
        self.tracker.active()
    }
}

impl Default for ChangeFeedHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for ChangeFeedHub {
    fn subscribe_deletes(&self, channel: &str, owner: &Identity) -> Subscription<FeedMessage> {
        let mut rx = self.sender.subscribe();
        let owner = owner.clone();
        let channel_name = channel.to_string();
        Subscription::spawn(channel, self.tracker.clone(), move |tx| async move {
            if tx.send(FeedMessage::Status(ChannelState::Subscribed)).is_err() {
                return;
            }
            loop {
                let message = match rx.recv().await {
                    Ok(FeedSignal::Change(event)) => {
                        if event.table != BOOKMARKS_TABLE || event.old.owner != owner {
                            continue;
                        }
                        FeedMessage::Deleted(event)
                    }
                    Ok(FeedSignal::Fault(err)) => {
                        warn!(target: "marksync.feed", channel = %channel_name, error = %err, "change feed fault");
                        FeedMessage::Status(ChannelState::ChannelError)
                    }
                    Err(RecvError::Lagged(missed)) => {
                        let err = FeedError::Lagged(missed);
                        warn!(target: "marksync.feed", channel = %channel_name, error = %err, "change feed receiver lagged");
                        FeedMessage::Status(ChannelState::ChannelError)
                    }
                    Err(RecvError::Closed) => {
                        let _ = tx.send(FeedMessage::Status(ChannelState::Closed));
                        break;
                    }
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        })
    }
}
