//! Channel, transport and subscriber error types.

use std::time::Duration;

use thiserror::Error;

use crate::state::ConnectionState;

/// Failure to open or keep a transport link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server rejected or could not be reached.
    #[error("connection refused: {0}")]
    Refused(String),
    /// The handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
    /// The link was closed.
    #[error("link closed")]
    Closed,
}

impl TransportError {
    /// Short category label for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Refused(_) => "refused",
            Self::Timeout(_) => "timeout",
            Self::Closed => "closed",
        }
    }
}

/// Errors returned by [`EventChannel`](crate::EventChannel) operations.
///
/// None of these are fatal to the process; each only fails the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// No identity in the credential store, or the identity changed since
    /// the session was opened.
    #[error("not authenticated")]
    NotAuthenticated,
    /// Send attempted without a live connection. Nothing was queued.
    #[error("not connected (channel is {state})")]
    NotConnected {
        /// State at the time of the call.
        state: ConnectionState,
    },
    /// Handshake retries were exhausted.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[from] TransportError),
    /// The channel is connected but the link refused the event, typically
    /// because it closed before the loss was noticed. Nothing was queued.
    #[error("send failed: {0}")]
    SendFailed(TransportError),
    /// The channel was torn down.
    #[error("channel has been shut down")]
    ShutDown,
}

impl ChannelError {
    /// Short category label for structured logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::NotConnected { .. } => "not_connected",
            Self::HandshakeFailed(_) => "handshake_failed",
            Self::SendFailed(_) => "send_failed",
            Self::ShutDown => "shut_down",
        }
    }
}

/// A subscriber callback failed during delivery.
///
/// Recorded in the [`DeliveryReport`](crate::DeliveryReport) for the round;
/// never propagated to the channel or other subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberCallbackError {
    /// The callback returned an error.
    #[error("subscriber failed: {0}")]
    Failed(String),
    /// The callback panicked.
    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

impl SubscriberCallbackError {
    /// Convenience constructor for [`Self::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Short category label for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn not_connected_display_names_state() {
        let err = ChannelError::NotConnected {
            state: ConnectionState::Connecting,
        };
        assert_eq!(err.to_string(), "not connected (channel is connecting)");
        assert_eq!(err.category(), "not_connected");
    }

    #[test]
    fn transport_error_converts_to_handshake_failed() {
        let err: ChannelError = TransportError::Closed.into();
        assert_matches!(err, ChannelError::HandshakeFailed(TransportError::Closed));
        assert_eq!(err.to_string(), "handshake failed: link closed");
    }

    #[test]
    fn send_failed_names_transport_cause() {
        let err = ChannelError::SendFailed(TransportError::Closed);
        assert_eq!(err.to_string(), "send failed: link closed");
        assert_eq!(err.category(), "send_failed");
    }

    #[test]
    fn timeout_display() {
        let err = TransportError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "handshake timed out after 250ms");
        assert_eq!(err.category(), "timeout");
    }

    #[test]
    fn subscriber_error_categories() {
        assert_eq!(SubscriberCallbackError::failed("x").category(), "failed");
        assert_eq!(
            SubscriberCallbackError::Panicked("boom".into()).to_string(),
            "subscriber panicked: boom"
        );
    }
}
