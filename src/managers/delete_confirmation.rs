//! Two-step delete confirmation.
//!
//! A first press arms the item; a second press inside the window confirms it.
//! An armed item whose window has elapsed is treated as idle again, so the
//! disarm is silent and needs no timer.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::types::bookmark::BookmarkId;

/// Default time a first press stays armed.
pub const DEFAULT_CONFIRM_WINDOW: Duration = Duration::from_secs(3);

/// Result of pressing delete on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// First press; another press inside the window will delete.
    Armed,
    /// Second press inside the window; the item is now executing.
    Confirmed,
    /// A delete for this item is already running.
    InFlight,
}

/// Per-item confirmation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmState {
    Idle,
    Armed,
    Executing,
}

/// Tracks armed and executing deletes for one session.
#[derive(Debug, Clone)]
pub struct DeleteConfirmation {
    window: Duration,
    armed: HashMap<BookmarkId, Instant>,
    executing: HashSet<BookmarkId>,
}

impl DeleteConfirmation {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed: HashMap::new(),
            executing: HashSet::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Registers a press at `now`.
    pub fn press(&mut self, id: &BookmarkId, now: Instant) -> PressOutcome {
        if self.executing.contains(id) {
            return PressOutcome::InFlight;
        }
        match self.armed.remove(id) {
            Some(armed_at) if now.saturating_duration_since(armed_at) < self.window => {
                self.executing.insert(id.clone());
                PressOutcome::Confirmed
            }
            _ => {
                self.armed.insert(id.clone(), now);
                PressOutcome::Armed
            }
        }
    }

    /// Marks a confirmed delete as finished, whatever its result.
    pub fn finish(&mut self, id: &BookmarkId) {
        self.executing.remove(id);
    }

    /// Drops any pending arm for `id`.
    pub fn disarm(&mut self, id: &BookmarkId) {
        self.armed.remove(id);
    }

    /// Arms currently held, expired or not.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    pub fn state(&self, id: &BookmarkId, now: Instant) -> ConfirmState {
        if self.executing.contains(id) {
            return ConfirmState::Executing;
        }
        match self.armed.get(id) {
            Some(armed_at) if now.saturating_duration_since(*armed_at) < self.window => {
                ConfirmState::Armed
            }
            _ => ConfirmState::Idle,
        }
    }

    /// Forgets arms whose window elapsed before `now`.
    pub fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.armed
            .retain(|_, armed_at| now.saturating_duration_since(*armed_at) < window);
    }
}

impl Default for DeleteConfirmation {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_WINDOW)
    }
}
