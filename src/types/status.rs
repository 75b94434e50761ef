use serde::{Deserialize, Serialize};

/// Tri-state real-time indicator exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// Footer text for the indicator.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting to real-time...",
            ConnectionStatus::Connected => "Real-time sync active",
            ConnectionStatus::Error => "Real-time error, check logs",
        }
    }
}

/// Subscription status as reported by a channel transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}
