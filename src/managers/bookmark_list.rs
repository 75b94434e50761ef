//! In-memory bookmark list for one session.
//!
//! Implements `BookmarkListTrait`: the session's ordered view of the shared
//! store. Only a full `replace_all` establishes newest-first order; partial
//! inserts assume the caller is prepending the newest item.

use std::collections::HashSet;

use crate::types::bookmark::{Bookmark, BookmarkId};

/// Trait defining the session's local list operations.
pub trait BookmarkListTrait {
    /// Overwrites the list with an authoritative result.
    fn replace_all(&mut self, items: Vec<Bookmark>);
    /// Prepends `item` unless its id is already present. Returns whether it was inserted.
    fn insert_if_absent(&mut self, item: Bookmark) -> bool;
    /// Removes the item with `id`. Returns whether anything was removed.
    fn remove_by_id(&mut self, id: &BookmarkId) -> bool;
    fn items(&self) -> &[Bookmark];
    fn contains(&self, id: &BookmarkId) -> bool;
}

/// Ordered, id-unique list of bookmarks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkList {
    items: Vec<Bookmark>,
}

impl BookmarkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrates the list from a server-provided initial fetch.
    pub fn from_initial(items: Vec<Bookmark>) -> Self {
        let mut list = Self::new();
        list.replace_all(items);
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &BookmarkId) -> Option<&Bookmark> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Puts back an item that was removed optimistically, at its newest-first
    /// position and ahead of items with the same timestamp. Returns whether it
    /// was inserted.
    pub fn restore(&mut self, item: Bookmark) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        let at = self
            .items
            .iter()
            .position(|existing| existing.created_at <= item.created_at)
            .unwrap_or(self.items.len());
        self.items.insert(at, item);
        true
    }
}

impl BookmarkListTrait for BookmarkList {
    /// Sorts newest-first (stable, so equal timestamps keep the store's order)
    /// and keeps the first occurrence of any duplicated id.
    fn replace_all(&mut self, mut items: Vec<Bookmark>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = HashSet::with_capacity(items.len());
        items.retain(|item| seen.insert(item.id.clone()));
        self.items = items;
    }

    fn insert_if_absent(&mut self, item: Bookmark) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    fn remove_by_id(&mut self, id: &BookmarkId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    fn items(&self) -> &[Bookmark] {
        &self.items
    }

    fn contains(&self, id: &BookmarkId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }
}
