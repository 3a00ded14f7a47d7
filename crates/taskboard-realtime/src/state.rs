//! Connection state owned by the channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`EventChannel`](crate::EventChannel).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No live link and no handshake in progress. A retry may be pending.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Live link; sends are accepted.
    Connected,
}

impl ConnectionState {
    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Whether a `connect` call would be a no-op.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
