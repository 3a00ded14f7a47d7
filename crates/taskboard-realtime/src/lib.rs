//! # taskboard-realtime
//!
//! Publish/subscribe event channel for the taskboard dashboard.
//!
//! - [`EventChannel`]: connection lifecycle, stamping and fan-out
//! - [`Subscription`]: revocable handle returned by [`EventChannel::subscribe`]
//! - [`Transport`]: the seam to the network; [`SimulatedTransport`] stands in
//!   for a WebSocket server
//! - [`DeliveryReport`]: per-subscriber outcomes of one delivery round
//!
//! ## Crate Position
//!
//! Depends on `taskboard-core` and `taskboard-settings`. Depended on by
//! `taskboard-state` and the binary.

#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod simulated;
pub mod state;
pub mod transport;

pub use channel::{ConnectOutcome, EventChannel};
pub use config::ChannelConfig;
pub use delivery::{DeliveryOutcome, DeliveryReport};
pub use errors::{ChannelError, SubscriberCallbackError, TransportError};
pub use registry::{Subscription, SubscriptionId};
pub use simulated::{SimulatedConfig, SimulatedTransport};
pub use state::ConnectionState;
pub use transport::{Link, LinkPeer, Transport};
