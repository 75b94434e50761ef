//! Reconciliation fetcher.
//!
//! Re-reads the owner's full list from the shared store and replaces the
//! session's list with it. Fetches are ticketed: when several overlap, only the
//! most recently started one is applied, so an older read can never overwrite
//! a newer one.

use std::future::Future;
use std::sync::Arc;

use crate::managers::bookmark_list::{BookmarkList, BookmarkListTrait};
use crate::store::RemoteStore;
use crate::types::bookmark::Bookmark;
use crate::types::errors::StoreError;
use crate::types::identity::Identity;

/// Identifies one started fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// What happened when a fetch result was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The list was replaced; carries the new length.
    Applied(usize),
    /// A newer fetch was started after this one; the result was dropped.
    Stale,
    /// The fetch failed; the list is unchanged.
    Failed(StoreError),
}

pub struct Reconciler {
    store: Arc<dyn RemoteStore>,
    owner: Identity,
    latest: u64,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RemoteStore>, owner: Identity) -> Self {
        Self {
            store,
            owner,
            latest: 0,
        }
    }

    /// Starts a fetch. The returned future owns everything it needs and can be spawned.
    pub fn begin(
        &mut self,
    ) -> (
        FetchTicket,
        impl Future<Output = Result<Vec<Bookmark>, StoreError>> + Send + 'static,
    ) {
        self.latest += 1;
        let store = Arc::clone(&self.store);
        let owner = self.owner.clone();
        let fetch = async move { store.fetch_all(&owner).await };
        (FetchTicket(self.latest), fetch)
    }

    /// Applies a finished fetch to `list`.
    pub fn apply(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<Bookmark>, StoreError>,
        list: &mut BookmarkList,
    ) -> ReconcileOutcome {
        match result {
            Err(err) => ReconcileOutcome::Failed(err),
            Ok(_) if ticket.0 < self.latest => ReconcileOutcome::Stale,
            Ok(items) => {
                list.replace_all(items);
                ReconcileOutcome::Applied(list.len())
            }
        }
    }
}
