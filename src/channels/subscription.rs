//! Disposable subscription handles shared by both notification channels.
//!
//! A [`Subscription`] owns the receiving end of a channel plus the task that
//! forwards transport messages into it. Dropping the handle (or calling
//! [`Subscription::unsubscribe`]) aborts the forwarder and releases the slot
//! counted by the hub's [`SubscriptionTracker`], exactly once.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Live subscription counter for one hub.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionTracker {
    active: Arc<AtomicUsize>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions that have been acquired and not yet released.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Receiving half of a channel subscription.
pub struct Subscription<T> {
    channel: String,
    rx: mpsc::UnboundedReceiver<T>,
    forwarder: JoinHandle<()>,
    tracker: SubscriptionTracker,
}

impl<T: Send + 'static> Subscription<T> {
    /// Registers a subscription and spawns `forward` to feed it.
    ///
    /// The transport-side receiver must already be registered by the caller
    /// before this is invoked, so no message published after `subscribe`
    /// returns can be missed.
    pub(crate) fn spawn<F, Fut>(channel: &str, tracker: SubscriptionTracker, forward: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tracker.acquire();
        let forwarder = tokio::spawn(forward(tx));
        debug!(target: "marksync.channels", channel, "subscription acquired");
        Self {
            channel: channel.to_string(),
            rx,
            forwarder,
            tracker,
        }
    }
}

impl<T> Subscription<T> {
    /// Waits for the next message. `None` once the transport side has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Channel name this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Releases the subscription now instead of at end of scope.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.tracker.release();
        debug!(target: "marksync.channels", channel = %self.channel, "subscription released");
    }
}
