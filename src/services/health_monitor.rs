// marksync connection health
// Folds change feed channel states into the tri-state indicator. Nothing in the
// sync path branches on the result.

use crate::types::status::{ChannelState, ConnectionStatus};

/// Tracks the change feed's status for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthMonitor {
    status: ConnectionStatus,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Applies a channel state. Returns the new status when it changed.
    pub fn apply(&mut self, state: ChannelState) -> Option<ConnectionStatus> {
        let next = match state {
            ChannelState::Subscribed => ConnectionStatus::Connected,
            ChannelState::ChannelError | ChannelState::TimedOut => ConnectionStatus::Error,
            ChannelState::Closed => return None,
        };
        if next == self.status {
            return None;
        }
        self.status = next;
        Some(next)
    }
}
