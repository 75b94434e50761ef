// marksync notification channels
// Two deliberately separate channels: the store's change feed (reliable deletes)
// and an app-level broadcast (best-effort insert hints).

pub mod broadcast;
pub mod change_feed;
pub mod subscription;

pub use broadcast::{BroadcastChannel, BroadcastEvent, BroadcastHub, BroadcastMessage, BroadcastOptions, MemberId};
pub use change_feed::{ChangeFeed, ChangeFeedHub, DeleteEvent, DeletedRecord, FeedMessage};
pub use subscription::{Subscription, SubscriptionTracker};
