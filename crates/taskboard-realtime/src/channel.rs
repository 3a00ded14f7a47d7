//! The event channel: connection lifecycle, stamping and fan-out.
//!
//! ## Sessions
//!
//! Every handshake cycle runs under a session number. `connect`,
//! `disconnect`, link loss and `shutdown` each start a new session and
//! cancel the previous session's token. Background work (handshake, backoff
//! sleep, inbound pump) re-checks its session after every await and drops
//! its result if the session moved on, so a stale completion never has an
//! effect.
//!
//! ## Locking
//!
//! All state transitions happen under one `parking_lot` mutex that is never
//! held across an await or while subscriber callbacks run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use rand::Rng;
use taskboard_core::auth::{Credential, CredentialStore, Identity};
use taskboard_core::events::{Event, EventBody, Timestamp, now_ms};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ChannelConfig;
use crate::delivery::{DeliveryOutcome, DeliveryReport};
use crate::errors::{ChannelError, SubscriberCallbackError, TransportError};
use crate::metrics::{
    CONNECTED, DELIVERY_ROUNDS_TOTAL, EVENTS_SENT_TOTAL, HANDSHAKE_FAILURES_TOTAL,
    SENDS_REJECTED_TOTAL, SUBSCRIBER_FAILURES_TOTAL,
};
use crate::registry::{Registry, Subscription};
use crate::state::ConnectionState;
use crate::transport::{Link, Transport};

/// What a [`EventChannel::connect`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A handshake was started.
    Started,
    /// Already connecting or connected; nothing changed.
    AlreadyActive,
}

struct Core {
    state: ConnectionState,
    session: u64,
    cancel: CancellationToken,
    /// Consecutive handshake failures in the current cycle.
    failures: u32,
    retry_pending: bool,
    gave_up: bool,
    last_failure: Option<TransportError>,
    credential: Option<Credential>,
    /// Identity the current session was opened with.
    identity: Option<Identity>,
    outbound: Option<mpsc::UnboundedSender<Event>>,
    last_stamp: Timestamp,
    shut_down: bool,
}

impl Core {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: 0,
            cancel: CancellationToken::new(),
            failures: 0,
            retry_pending: false,
            gave_up: false,
            last_failure: None,
            credential: None,
            identity: None,
            outbound: None,
            last_stamp: 0,
            shut_down: false,
        }
    }

    /// Cancel the current session's background work and start a new one.
    fn next_session(&mut self) -> (u64, CancellationToken) {
        self.cancel.cancel();
        self.session += 1;
        self.cancel = CancellationToken::new();
        self.retry_pending = false;
        self.last_stamp = 0;
        (self.session, self.cancel.clone())
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    config: ChannelConfig,
    core: Mutex<Core>,
    registry: Arc<Registry>,
    state_tx: watch::Sender<ConnectionState>,
    reports_tx: broadcast::Sender<DeliveryReport>,
}

/// Publish/subscribe channel for dashboard events.
///
/// Cheap to clone; clones share one connection and one subscriber list.
/// Construct one per application (or per test) and pass it to consumers.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<Inner>,
}

impl EventChannel {
    /// Create a disconnected channel.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        config: ChannelConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (reports_tx, _) = broadcast::channel(config.report_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                config,
                core: Mutex::new(Core::new()),
                registry: Arc::new(Registry::new()),
                state_tx,
                reports_tx,
            }),
        }
    }

    // ── Observation ─────────────────────────────────────────────────

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.core.lock().state
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Consecutive handshake failures in the current cycle.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.core.lock().failures
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Receiver of one [`DeliveryReport`] per delivery round.
    pub fn delivery_reports(&self) -> broadcast::Receiver<DeliveryReport> {
        self.inner.reports_tx.subscribe()
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register `callback` for every future event, across reconnects.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), SubscriberCallbackError> + Send + Sync + 'static,
    {
        self.inner.registry.insert(Arc::new(callback))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Start connecting with `credential`.
    ///
    /// No-op while connecting or connected. A pending retry is cancelled
    /// and the failure counter reset. The handshake completes in the
    /// background; observe it with [`Self::watch_state`] or
    /// [`Self::wait_until_connected`].
    pub fn connect(&self, credential: Credential) -> Result<ConnectOutcome, ChannelError> {
        let identity = self
            .inner
            .credentials
            .identity()
            .ok_or(ChannelError::NotAuthenticated)?;

        let mut core = self.inner.core.lock();
        if core.shut_down {
            return Err(ChannelError::ShutDown);
        }
        if core.state.is_active() {
            debug!(state = %core.state, "connect ignored, already active");
            return Ok(ConnectOutcome::AlreadyActive);
        }

        let (session, cancel) = core.next_session();
        core.failures = 0;
        core.gave_up = false;
        core.last_failure = None;
        core.credential = Some(credential.clone());
        core.identity = Some(identity.clone());
        self.set_state(&mut core, ConnectionState::Connecting);
        drop(core);

        info!(session, user_id = %identity.id, "connecting");
        self.spawn_handshake(session, credential, identity, cancel);
        Ok(ConnectOutcome::Started)
    }

    /// Go `Disconnected` and cancel any pending retry or in-flight round
    /// trip. Subscriptions are kept.
    pub fn disconnect(&self) {
        let mut core = self.inner.core.lock();
        let previous = core.state;
        let (session, _) = core.next_session();
        core.outbound = None;
        core.identity = None;
        core.gave_up = false;
        self.set_state(&mut core, ConnectionState::Disconnected);
        drop(core);

        gauge!(CONNECTED).set(0.0);
        info!(session, from = %previous, "disconnected");
    }

    /// Disconnect, revoke every subscription and refuse later connects.
    pub fn shutdown(&self) {
        let mut core = self.inner.core.lock();
        if core.shut_down {
            return;
        }
        core.shut_down = true;
        let _ = core.next_session();
        core.outbound = None;
        core.identity = None;
        core.credential = None;
        self.set_state(&mut core, ConnectionState::Disconnected);
        drop(core);

        gauge!(CONNECTED).set(0.0);
        let revoked = self.inner.registry.clear();
        info!(revoked, "channel shut down");
    }

    /// Wait until connected.
    ///
    /// Fails with `HandshakeFailed` once retries are exhausted, or with
    /// `NotConnected` if the channel is disconnected with no retry pending.
    pub async fn wait_until_connected(&self) -> Result<(), ChannelError> {
        let mut rx = self.inner.state_tx.subscribe();
        loop {
            {
                let core = self.inner.core.lock();
                if core.shut_down {
                    return Err(ChannelError::ShutDown);
                }
                match core.state {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Connecting => {}
                    ConnectionState::Disconnected if core.retry_pending => {}
                    ConnectionState::Disconnected => {
                        return Err(match (&core.last_failure, core.gave_up) {
                            (Some(error), true) => ChannelError::HandshakeFailed(error.clone()),
                            _ => ChannelError::NotConnected {
                                state: ConnectionState::Disconnected,
                            },
                        });
                    }
                }
            }
            if rx.changed().await.is_err() {
                return Err(ChannelError::ShutDown);
            }
        }
    }

    // ── Sending ─────────────────────────────────────────────────────

    /// Stamp `body` with the current identity and time and send it.
    ///
    /// On success the stamped event is returned; it reaches every
    /// subscriber, the sender included, after the transport round trip.
    /// Nothing is queued on failure.
    pub fn send(&self, body: EventBody) -> Result<Event, ChannelError> {
        let kind = body.kind();
        let Some(identity) = self.inner.credentials.identity() else {
            return Err(reject(ChannelError::NotAuthenticated));
        };

        let mut core = self.inner.core.lock();
        if core.state != ConnectionState::Connected {
            debug!(kind = %kind, state = %core.state, "send rejected");
            return Err(reject(ChannelError::NotConnected { state: core.state }));
        }
        if core.identity.as_ref().map(|i| i.id.as_str()) != Some(identity.id.as_str()) {
            warn!(kind = %kind, user_id = %identity.id, "identity changed since connect, send rejected");
            return Err(reject(ChannelError::NotAuthenticated));
        }

        let timestamp = now_ms().max(core.last_stamp);
        let event = body.stamp(timestamp, identity.id);
        let delivered = core
            .outbound
            .as_ref()
            .is_some_and(|outbound| outbound.send(event.clone()).is_ok());
        if !delivered {
            debug!(kind = %kind, session = core.session, "outbound link closed, send rejected");
            return Err(reject(ChannelError::SendFailed(TransportError::Closed)));
        }
        core.last_stamp = timestamp;
        let session = core.session;
        drop(core);

        counter!(EVENTS_SENT_TOTAL, "kind" => kind.as_str()).increment(1);
        debug!(kind = %kind, session, timestamp, "event sent");
        Ok(event)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn set_state(&self, core: &mut Core, state: ConnectionState) {
        core.state = state;
        let _ = self.inner.state_tx.send_replace(state);
    }

    fn is_current(&self, session: u64) -> bool {
        self.inner.core.lock().session == session
    }

    fn spawn_handshake(
        &self,
        session: u64,
        credential: Credential,
        identity: Identity,
        cancel: CancellationToken,
    ) {
        let channel = self.clone();
        let _ = tokio::spawn(async move {
            channel.run_handshake(session, credential, identity, cancel).await;
        });
    }

    #[instrument(name = "handshake", skip_all, fields(session = session, user_id = %identity.id))]
    async fn run_handshake(
        self,
        session: u64,
        credential: Credential,
        identity: Identity,
        cancel: CancellationToken,
    ) {
        let timeout = self.inner.config.handshake_timeout;
        loop {
            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                opened = tokio::time::timeout(timeout, self.inner.transport.open(&credential, &identity)) => opened,
            };
            let result = opened.unwrap_or(Err(TransportError::Timeout(timeout)));

            let link = match result {
                Ok(link) => link,
                Err(error) => {
                    let Some(delay) = self.on_handshake_failed(session, error) else {
                        return;
                    };
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(delay) => {}
                    }
                    if !self.begin_retry(session) {
                        return;
                    }
                    continue;
                }
            };

            self.on_connected(session, link, cancel);
            return;
        }
    }

    /// Record a failure. Returns the backoff delay, or `None` when retrying
    /// stops (exhausted or stale session).
    fn on_handshake_failed(&self, session: u64, error: TransportError) -> Option<Duration> {
        let mut core = self.inner.core.lock();
        if core.session != session {
            return None;
        }
        counter!(HANDSHAKE_FAILURES_TOTAL, "category" => error.category()).increment(1);
        core.failures += 1;
        let failures = core.failures;
        let policy = &self.inner.config.backoff;

        if policy.is_exhausted(failures) {
            core.gave_up = true;
            core.retry_pending = false;
            core.last_failure = Some(error.clone());
            self.set_state(&mut core, ConnectionState::Disconnected);
            drop(core);
            warn!(session, attempt = failures, error = %error, "handshake failed, reconnect attempts exhausted");
            return None;
        }

        let retry = failures - 1;
        let delay = if policy.jitter_factor > 0.0 {
            policy.jittered_delay_for(retry, rand::rng().random::<f64>())
        } else {
            policy.delay_for(retry)
        };
        core.retry_pending = true;
        core.last_failure = Some(error.clone());
        self.set_state(&mut core, ConnectionState::Disconnected);
        drop(core);

        warn!(
            session,
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "handshake failed, retrying"
        );
        Some(delay)
    }

    fn begin_retry(&self, session: u64) -> bool {
        let mut core = self.inner.core.lock();
        if core.session != session {
            return false;
        }
        core.retry_pending = false;
        self.set_state(&mut core, ConnectionState::Connecting);
        debug!(session, attempt = core.failures + 1, "retrying handshake");
        true
    }

    fn on_connected(&self, session: u64, link: Link, cancel: CancellationToken) {
        let Link { outbound, inbound } = link;
        let mut core = self.inner.core.lock();
        if core.session != session || core.state != ConnectionState::Connecting {
            debug!(session, "stale handshake completed, closing link");
            return;
        }
        core.outbound = Some(outbound);
        core.failures = 0;
        core.gave_up = false;
        core.last_failure = None;
        self.set_state(&mut core, ConnectionState::Connected);
        drop(core);

        gauge!(CONNECTED).set(1.0);
        info!(session, "connected");

        let channel = self.clone();
        let _ = tokio::spawn(async move {
            channel.pump(session, inbound, cancel).await;
        });
    }

    async fn pump(self, session: u64, mut inbound: mpsc::UnboundedReceiver<Event>, cancel: CancellationToken) {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                next = inbound.recv() => next,
            };
            match next {
                Some(event) => {
                    if !self.is_current(session) {
                        return;
                    }
                    let _ = self.deliver(&event);
                }
                None => {
                    self.on_link_lost(session);
                    return;
                }
            }
        }
    }

    fn on_link_lost(&self, session: u64) {
        let mut core = self.inner.core.lock();
        if core.session != session || core.state != ConnectionState::Connected {
            return;
        }
        let (Some(credential), Some(identity)) = (core.credential.clone(), core.identity.clone()) else {
            return;
        };
        let (next, cancel) = core.next_session();
        core.outbound = None;
        core.failures = 0;
        self.set_state(&mut core, ConnectionState::Connecting);
        drop(core);

        gauge!(CONNECTED).set(0.0);
        warn!(session, next_session = next, "link lost, reconnecting");
        self.spawn_handshake(next, credential, identity, cancel);
    }

    /// Run one delivery round over a snapshot of the subscribers.
    fn deliver(&self, event: &Event) -> DeliveryReport {
        let kind = event.kind();
        let entries = self.inner.registry.snapshot();
        let mut outcomes = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.is_revoked() {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| (entry.callback)(event)))
                .unwrap_or_else(|panic| Err(SubscriberCallbackError::Panicked(panic_message(&*panic))));
            if let Err(error) = &result {
                counter!(SUBSCRIBER_FAILURES_TOTAL, "category" => error.category()).increment(1);
                warn!(subscriber = %entry.id, kind = %kind, error = %error, "subscriber callback failed");
            }
            outcomes.push(DeliveryOutcome {
                subscriber: entry.id,
                result,
            });
        }

        counter!(DELIVERY_ROUNDS_TOTAL, "kind" => kind.as_str()).increment(1);
        debug!(kind = %kind, origin_id = %event.origin_id, recipients = outcomes.len(), "delivered event");

        let report = DeliveryReport::for_event(event, outcomes);
        // no receivers is fine
        let _ = self.inner.reports_tx.send(report.clone());
        report
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("EventChannel")
            .field("state", &core.state)
            .field("session", &core.session)
            .field("failures", &core.failures)
            .field("subscribers", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

fn reject(error: ChannelError) -> ChannelError {
    counter!(SENDS_REJECTED_TOTAL, "reason" => error.category()).increment(1);
    error
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LinkPeer, MockTransport};
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use taskboard_core::auth::{MemoryCredentialStore, Role};
    use taskboard_core::events::TaskRef;
    use taskboard_core::retry::BackoffPolicy;

    fn store() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::signed_in(
            Credential::new("tok"),
            Identity::new("3", Role::Developer),
        ))
    }

    fn config(max_attempts: u32) -> ChannelConfig {
        ChannelConfig {
            backoff: BackoffPolicy {
                max_attempts,
                ..BackoffPolicy::default()
            },
            ..ChannelConfig::default()
        }
    }

    fn deleted() -> EventBody {
        EventBody::TaskDeleted(TaskRef {
            project_id: "p1".into(),
            task_id: "t1".into(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn mock_refusal_exhausts_single_attempt() {
        let mut transport = MockTransport::new();
        let _ = transport
            .expect_open()
            .times(1)
            .returning(|_, _| Err(TransportError::Refused("nope".into())));

        let channel = EventChannel::new(Arc::new(transport), store(), config(1));
        assert_eq!(channel.connect(Credential::new("tok")).unwrap(), ConnectOutcome::Started);

        let result = channel.wait_until_connected().await;
        assert_matches!(result, Err(ChannelError::HandshakeFailed(TransportError::Refused(_))));
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.reconnect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_link_carries_events_both_ways() {
        let (link, mut peer) = Link::pair();
        let mut slot = Some(link);
        let mut transport = MockTransport::new();
        let _ = transport
            .expect_open()
            .times(1)
            .returning(move |_, _| slot.take().ok_or(TransportError::Closed));

        let channel = EventChannel::new(Arc::new(transport), store(), ChannelConfig::default());
        let seen = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&seen);
        let _sub = channel.subscribe(move |_| {
            let _ = hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _ = channel.connect(Credential::new("tok")).unwrap();
        channel.wait_until_connected().await.unwrap();

        let sent = channel.send(deleted()).unwrap();
        assert_eq!(sent.origin_id, "3");
        assert_eq!(peer.received.recv().await.unwrap(), sent);

        let mut reports = channel.delivery_reports();
        peer.sender.send(sent).unwrap();
        let report = reports.recv().await.unwrap();
        assert_eq!(report.delivered(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_receives_credential_and_store_identity() {
        let mut transport = MockTransport::new();
        let _ = transport
            .expect_open()
            .withf(|credential, identity| credential.expose() == "tok-2" && identity.id == "3")
            .times(1)
            .returning(|_, _| Err(TransportError::Closed));

        let channel = EventChannel::new(Arc::new(transport), store(), config(1));
        let _ = channel.connect(Credential::new("tok-2")).unwrap();
        let result = channel.wait_until_connected().await;
        assert_matches!(result, Err(ChannelError::HandshakeFailed(TransportError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn send_on_closed_outbound_reports_transport_closed() {
        let (link, peer) = Link::pair();
        let mut slot = Some(link);
        let mut transport = MockTransport::new();
        let _ = transport
            .expect_open()
            .times(1)
            .returning(move |_, _| slot.take().ok_or(TransportError::Closed));

        let channel = EventChannel::new(Arc::new(transport), store(), ChannelConfig::default());
        let _ = channel.connect(Credential::new("tok")).unwrap();
        channel.wait_until_connected().await.unwrap();

        // Server stops reading but keeps its inbound sender, so the pump
        // has not observed a lost link yet.
        let LinkPeer { received, sender } = peer;
        drop(received);

        let result = channel.send(deleted());
        assert_matches!(result, Err(ChannelError::SendFailed(TransportError::Closed)));
        assert_eq!(channel.state(), ConnectionState::Connected);
        drop(sender);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*boxed), "non-string panic payload");
    }
}
