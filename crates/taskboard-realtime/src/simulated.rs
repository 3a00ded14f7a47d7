//! In-process stand-in for the real-time server.
//!
//! [`SimulatedTransport`] completes handshakes after a fixed latency and
//! loops every outbound event back to the client after the echo delay,
//! measured from send time and in send order. It can also broadcast
//! presence from a simulated user and inject faults for tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use taskboard_core::auth::{Credential, Identity};
use taskboard_core::events::{Event, EventBody, Presence, now_ms};
use taskboard_settings::TaskboardSettings;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::TransportError;
use crate::transport::{Link, LinkPeer, Transport};

/// Origin ID stamped on simulated presence broadcasts.
pub const PRESENCE_ORIGIN: &str = "simulated-user";

/// Timing of the simulated server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedConfig {
    /// Time a handshake takes.
    pub handshake_latency: Duration,
    /// Round trip before an outbound event is echoed back.
    pub echo_delay: Duration,
    /// Period of presence broadcasts, `None` to disable.
    pub presence_interval: Option<Duration>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            handshake_latency: Duration::from_millis(500),
            echo_delay: Duration::from_millis(100),
            presence_interval: Some(Duration::from_secs(10)),
        }
    }
}

impl SimulatedConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &TaskboardSettings) -> Self {
        Self {
            handshake_latency: Duration::from_millis(settings.channel.handshake_latency_ms),
            echo_delay: Duration::from_millis(settings.channel.echo_delay_ms),
            presence_interval: settings
                .channel
                .presence_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    /// Same timing with presence broadcasts disabled.
    #[must_use]
    pub fn without_presence(mut self) -> Self {
        self.presence_interval = None;
        self
    }
}

struct LiveLink {
    injector: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
}

/// Simulated WebSocket server behind the [`Transport`] seam.
pub struct SimulatedTransport {
    config: SimulatedConfig,
    handshakes: AtomicU32,
    failures_remaining: AtomicU32,
    offline: AtomicBool,
    live: Mutex<Option<LiveLink>>,
}

impl SimulatedTransport {
    /// Create a transport with the given timing.
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            handshakes: AtomicU32::new(0),
            failures_remaining: AtomicU32::new(0),
            offline: AtomicBool::new(false),
            live: Mutex::new(None),
        }
    }

    /// Timing in use.
    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    // ── Fault injection ─────────────────────────────────────────────

    /// Reject the next `count` handshakes.
    pub fn fail_next_handshakes(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// While offline every handshake is refused.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Handshakes started so far, successful or not.
    pub fn handshake_attempts(&self) -> u32 {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// Broadcast `event` to the connected client as if another user sent it.
    ///
    /// Returns `false` when there is no live link.
    pub fn inject(&self, event: Event) -> bool {
        self.live
            .lock()
            .as_ref()
            .is_some_and(|live| live.injector.send(event).is_ok())
    }

    /// Close the live link from the server side.
    ///
    /// Returns `false` when there was nothing to close.
    pub fn drop_link(&self) -> bool {
        let Some(live) = self.live.lock().take() else {
            return false;
        };
        live.cancel.cancel();
        info!("simulated link dropped by server");
        true
    }

    /// Whether a client is currently attached.
    pub fn has_live_link(&self) -> bool {
        self.live
            .lock()
            .as_ref()
            .is_some_and(|live| !live.injector.is_closed())
    }

    fn establish(&self, identity: &Identity) -> Link {
        let (link, LinkPeer { received, sender }) = Link::pair();
        let cancel = CancellationToken::new();

        let previous = self.live.lock().replace(LiveLink {
            injector: sender.clone(),
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        spawn_echo(received, sender.clone(), self.config.echo_delay, cancel.clone());
        if let Some(every) = self.config.presence_interval {
            spawn_presence(sender, every, cancel);
        }

        info!(user_id = %identity.id, "simulated link established");
        link
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn open(&self, _credential: &Credential, identity: &Identity) -> Result<Link, TransportError> {
        let attempt = self.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(attempt, user_id = %identity.id, "simulated handshake started");

        tokio::time::sleep(self.config.handshake_latency).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Refused("server unreachable".into()));
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Refused("handshake rejected".into()));
        }

        Ok(self.establish(identity))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server tasks
// ─────────────────────────────────────────────────────────────────────────────

/// Loop outbound events back after `delay`.
///
/// The first stage stamps each event with its due time on arrival; the
/// second releases them in arrival order once due.
fn spawn_echo(
    mut received: mpsc::UnboundedReceiver<Event>,
    sender: mpsc::UnboundedSender<Event>,
    delay: Duration,
    cancel: CancellationToken,
) {
    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<(Instant, Event)>();

    let stamp_cancel = cancel.clone();
    let _ = tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                () = stamp_cancel.cancelled() => break,
                next = received.recv() => next,
            };
            let Some(event) = next else { break };
            if queue_tx.send((Instant::now() + delay, event)).is_err() {
                break;
            }
        }
    });

    let _ = tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = queue_rx.recv() => next,
            };
            let Some((due, event)) = next else { break };
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep_until(due) => {}
            }
            if sender.send(event).is_err() {
                break;
            }
        }
    });
}

fn spawn_presence(sender: mpsc::UnboundedSender<Event>, every: Duration, cancel: CancellationToken) {
    let _ = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = sender.closed() => break,
                _ = ticker.tick() => {
                    if sender.send(presence_event()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn presence_event() -> Event {
    let resource_id = rand::rng().random_range(1..=5);
    EventBody::PresenceActivity(Presence {
        action: "viewing".into(),
        resource: "project".into(),
        resource_id,
    })
    .stamp(now_ms(), PRESENCE_ORIGIN)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
