//! Application-level broadcast channel used to hint sibling sessions about inserts.
//!
//! Payloads travel JSON-encoded, the way a networked transport would carry
//! them. Delivery is at-most-once: nothing is buffered for late subscribers
//! and there is no acknowledgement or retry. A channel exists while someone is
//! subscribed to it; sending never creates one.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::subscription::{Subscription, SubscriptionTracker};
use crate::types::bookmark::BookmarkId;
use crate::types::errors::BroadcastError;

const DEFAULT_CAPACITY: usize = 64;

/// Identifies one participant on a broadcast channel.
pub type MemberId = Uuid;

/// Events carried on the broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum BroadcastEvent {
    /// A sibling inserted a bookmark. The id is informational only.
    ItemAdded { id: BookmarkId },
}

/// A decoded broadcast as seen by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    pub channel: String,
    pub from: MemberId,
    pub event: BroadcastEvent,
}

/// Per-subscription delivery options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOptions {
    /// Deliver messages this member sent itself.
    pub receive_own: bool,
}

/// Publish/subscribe channel shared by the sessions of one identity.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Joins `channel` as `member`.
    fn subscribe(
        &self,
        channel: &str,
        member: MemberId,
        options: BroadcastOptions,
    ) -> Subscription<BroadcastMessage>;

    /// Publishes `event` on `channel`. Succeeds when nobody is listening.
    async fn send(
        &self,
        channel: &str,
        from: MemberId,
        event: BroadcastEvent,
    ) -> Result<(), BroadcastError>;
}

#[derive(Debug, Clone)]
struct WireFrame {
    from: MemberId,
    body: String,
}

/// In-process broadcast hub, one tokio broadcast channel per name.
#[derive(Debug)]
pub struct BroadcastHub {
    channels: RwLock<HashMap<String, broadcast::Sender<WireFrame>>>,
    tracker: SubscriptionTracker,
    capacity: usize,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            tracker: SubscriptionTracker::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.tracker.active()
    }

    /// Named channels currently held by the hub.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Drops channels nobody listens on any more. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let mut guard = self.channels.write();
        let before = guard.len();
        guard.retain(|_, sender| sender.receiver_count() > 0);
        before - guard.len()
    }

    /// Joins `channel`, creating it if needed, and prunes idle channels under the same lock.
    fn receiver_for(&self, channel: &str) -> broadcast::Receiver<WireFrame> {
        let mut guard = self.channels.write();
        guard.retain(|name, sender| name == channel || sender.receiver_count() > 0);
        guard
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastChannel for BroadcastHub {
    fn subscribe(
        &self,
        channel: &str,
        member: MemberId,
        options: BroadcastOptions,
    ) -> Subscription<BroadcastMessage> {
        let mut rx = self.receiver_for(channel);
        let channel_name = channel.to_string();
        Subscription::spawn(channel, self.tracker.clone(), move |tx| async move {
            loop {
                let frame = match rx.recv().await {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(target: "marksync.broadcast", channel = %channel_name, missed, "broadcast receiver lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if frame.from == member && !options.receive_own {
                    continue;
                }
                let event = match serde_json::from_str::<BroadcastEvent>(&frame.body) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(target: "marksync.broadcast", channel = %channel_name, error = %err, "dropping undecodable broadcast");
                        continue;
                    }
                };
                let message = BroadcastMessage {
                    channel: channel_name.clone(),
                    from: frame.from,
                    event,
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        })
    }

    async fn send(
        &self,
        channel: &str,
        from: MemberId,
        event: BroadcastEvent,
    ) -> Result<(), BroadcastError> {
        let body =
            serde_json::to_string(&event).map_err(|e| BroadcastError::Encoding(e.to_string()))?;
        let sender = self.channels.read().get(channel).cloned();
        let delivered = sender
            .and_then(|sender| sender.send(WireFrame { from, body }).ok())
            .unwrap_or(0);
        debug!(target: "marksync.broadcast", channel, %from, delivered, "broadcast sent");
        Ok(())
    }
}
