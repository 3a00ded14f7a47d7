//! The seam between the channel and the network.
//!
//! A [`Transport`] performs the handshake and hands back a [`Link`]: an
//! outbound sender and an inbound stream of events. The link is closed from
//! the client side by dropping `outbound`, and from the server side by
//! dropping every sender feeding `inbound`.

use async_trait::async_trait;
use taskboard_core::auth::{Credential, Identity};
use taskboard_core::events::Event;
use tokio::sync::mpsc;

use crate::errors::TransportError;

/// A live, bidirectional event link.
#[derive(Debug)]
pub struct Link {
    /// Events sent to the server.
    pub outbound: mpsc::UnboundedSender<Event>,
    /// Events broadcast by the server. Yields `None` once the server side
    /// is gone.
    pub inbound: mpsc::UnboundedReceiver<Event>,
}

/// The server end of a [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    /// Events the client sent.
    pub received: mpsc::UnboundedReceiver<Event>,
    /// Feeds the client's inbound stream.
    pub sender: mpsc::UnboundedSender<Event>,
}

impl Link {
    /// Create a connected client/server pair.
    pub fn pair() -> (Link, LinkPeer) {
        let (outbound, received) = mpsc::unbounded_channel();
        let (sender, inbound) = mpsc::unbounded_channel();
        (Link { outbound, inbound }, LinkPeer { received, sender })
    }
}

/// Opens links to the real-time server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake for `identity` using `credential`.
    async fn open(&self, credential: &Credential, identity: &Identity) -> Result<Link, TransportError>;
}
