//! The connection session: one physical connection, end to end.
//!
//! A session owns exactly one connection attempt and walks an explicit
//! state machine:
//!
//! ```text
//!   Connecting ──→ Subscribing ──→ Streaming ──→ Closed
//!        │              │              │            ▲
//!        └──────────────┴──────────────┴─(error)────┘
//! ```
//!
//! - **Connecting**: open the WebSocket with the negotiated token.
//! - **Subscribing**: send the subscribe invocation and wait for the first
//!   envelope carrying reference data — the feed's implicit acknowledgement.
//! - **Streaming**: a single `select!` loop multiplexes the read path, the
//!   keep-alive tick, the idle deadline and the stop signal. The read path
//!   is the only producer of records and delivers them synchronously to the
//!   recorder, so a slow sink applies backpressure instead of losing data.
//! - **Closed**: terminal. The session reports *why* it closed and how many
//!   records it delivered; retry policy lives entirely in the supervisor.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval_at, sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use slipstream_protocol::{decode_payload, subscribe_invocation, Envelope, TopicName};
use slipstream_transport::{
    AuthContext, ConnectionToken, FeedConfig, FeedConnection, FeedWriter,
};

use crate::{DecodedRecord, Recorder, SessionError, StopSignal};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing knobs for a single session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the subscribe acknowledgement.
    pub subscribe_timeout: Duration,
    /// Interval between outbound keep-alive pings. Also the upper bound on
    /// how long a stop request can go unobserved.
    pub keepalive_interval: Duration,
    /// Silence window after which the connection is presumed dead.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subscribe_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Clamps out-of-range values so the config is safe to run with.
    ///
    /// Rules:
    /// - `keepalive_interval` must be non-zero (a zero interval would spin).
    /// - `idle_timeout` must be at least `keepalive_interval`, otherwise
    ///   every quiet spell between pings would count as idle.
    pub fn validated(mut self) -> Self {
        if self.keepalive_interval.is_zero() {
            warn!("keepalive_interval of zero — using 1s");
            self.keepalive_interval = Duration::from_secs(1);
        }
        if self.idle_timeout < self.keepalive_interval {
            warn!(
                idle = ?self.idle_timeout,
                keepalive = ?self.keepalive_interval,
                "idle_timeout below keepalive_interval — clamping up"
            );
            self.idle_timeout = self.keepalive_interval;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opening the persistent connection.
    Connecting,
    /// Subscribe invocation sent, waiting for reference data.
    Subscribing,
    /// Receiving and recording the envelope stream.
    Streaming,
    /// Terminal. No further records are emitted.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Subscribing => write!(f, "subscribing"),
            Self::Streaming => write!(f, "streaming"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// How a session ended: the close reason plus how much it delivered.
///
/// `records_delivered` is what lets the supervisor distinguish "connection
/// flapped after hours of healthy streaming" from "never got anywhere".
#[derive(Debug)]
pub struct SessionEnd {
    /// Why the session closed.
    pub reason: SessionError,
    /// Records delivered to the recorder during this session.
    pub records_delivered: u64,
}

// ---------------------------------------------------------------------------
// ConnectionSession
// ---------------------------------------------------------------------------

/// One connection attempt against the feed.
///
/// Consumed by [`run`](Self::run); a reconnect is a *new* session with a
/// freshly negotiated token, never a reused one.
pub struct ConnectionSession<'a> {
    feed: &'a FeedConfig,
    auth: &'a AuthContext,
    config: SessionConfig,
    topics: &'a BTreeSet<TopicName>,
    stop: Option<StopSignal>,
    state: SessionState,
    /// Sequence ids observed this session; duplicates are dropped.
    seen: HashSet<String>,
    records_delivered: u64,
}

impl<'a> ConnectionSession<'a> {
    /// Creates a session for one attempt.
    pub fn new(
        feed: &'a FeedConfig,
        auth: &'a AuthContext,
        config: SessionConfig,
        topics: &'a BTreeSet<TopicName>,
    ) -> Self {
        Self {
            feed,
            auth,
            config: config.validated(),
            topics,
            stop: None,
            state: SessionState::Connecting,
            seen: HashSet::new(),
            records_delivered: 0,
        }
    }

    /// Attaches a stop signal observed during subscribe and streaming.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state change");
        self.state = next;
    }

    /// Runs the session to completion.
    ///
    /// Always terminates in `Closed`; the returned [`SessionEnd`] carries
    /// the close reason (including [`SessionError::Cancelled`] for a
    /// caller-requested stop) and the delivery count.
    pub async fn run<R: Recorder>(
        mut self,
        token: &ConnectionToken,
        recorder: &mut R,
    ) -> SessionEnd {
        let reason = self.drive(token, recorder).await;
        self.transition(SessionState::Closed);
        if !reason.is_cancelled() {
            warn!(reason = %reason, records = self.records_delivered, "session closed");
        }
        SessionEnd {
            reason,
            records_delivered: self.records_delivered,
        }
    }

    async fn drive<R: Recorder>(
        &mut self,
        token: &ConnectionToken,
        recorder: &mut R,
    ) -> SessionError {
        let mut stop = self.stop.take();

        // -- Connecting ----------------------------------------------------
        let connection = match FeedConnection::connect(self.feed, self.auth, token).await {
            Ok(connection) => connection,
            Err(e) => return SessionError::ConnectFailed(e.to_string()),
        };
        let (mut reader, mut writer) = connection.split();
        info!(hub = %self.feed.hub, "feed connection established");

        // -- Subscribing ---------------------------------------------------
        self.transition(SessionState::Subscribing);
        let invocation = subscribe_invocation(&self.feed.hub, self.topics, 0);
        if let Err(e) = writer.send_text(&invocation).await {
            return SessionError::ConnectFailed(e.to_string());
        }
        let deadline = Instant::now() + self.config.subscribe_timeout;
        loop {
            let frame = tokio::select! {
                _ = wait_stop(&mut stop) => {
                    return close_cancelled(&mut writer).await;
                }
                result = tokio::time::timeout_at(deadline, reader.next_frame()) => {
                    match result {
                        Err(_) => {
                            return SessionError::SubscribeTimeout(
                                self.config.subscribe_timeout,
                            );
                        }
                        Ok(Err(e)) => return SessionError::ConnectFailed(e.to_string()),
                        Ok(Ok(None)) => {
                            return SessionError::ConnectionLost(
                                "closed before subscribe acknowledgement".into(),
                            );
                        }
                        Ok(Ok(Some(frame))) => frame,
                    }
                }
            };
            match self.handle_frame(&frame, recorder) {
                Err(e) => return e,
                Ok(true) => break,
                Ok(false) => {}
            }
        }
        info!(topics = self.topics.len(), "subscription acknowledged");

        // -- Streaming -----------------------------------------------------
        self.transition(SessionState::Streaming);
        let mut keepalive = interval_at(
            Instant::now() + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );
        let mut idle_deadline = Instant::now() + self.config.idle_timeout;
        loop {
            tokio::select! {
                _ = wait_stop(&mut stop) => {
                    return close_cancelled(&mut writer).await;
                }
                _ = sleep_until(idle_deadline) => {
                    return SessionError::Idle(self.config.idle_timeout);
                }
                _ = keepalive.tick() => {
                    if let Err(e) = writer.send_ping().await {
                        return SessionError::ConnectionLost(e.to_string());
                    }
                    trace!("keep-alive ping sent");
                }
                result = reader.next_frame() => {
                    let frame = match result {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            return SessionError::ConnectionLost(
                                "connection closed by feed".into(),
                            );
                        }
                        Err(e) => return SessionError::ConnectionLost(e.to_string()),
                    };
                    idle_deadline = Instant::now() + self.config.idle_timeout;
                    if let Err(e) = self.handle_frame(&frame, recorder) {
                        return e;
                    }
                }
            }
        }
    }

    /// Decodes one frame and delivers its entries. Returns whether the
    /// envelope carried reference data (the subscribe acknowledgement).
    ///
    /// Local decode failures are dropped with a warning — one bad entry
    /// must not abort an otherwise healthy stream. Sink failures abort.
    fn handle_frame<R: Recorder>(
        &mut self,
        frame: &str,
        recorder: &mut R,
    ) -> Result<bool, SessionError> {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return Ok(false);
            }
        };

        if let Some(server_error) = &envelope.error {
            warn!(error = %server_error, "feed reported an error");
        }
        if envelope.is_keepalive() {
            trace!("keep-alive envelope");
            return Ok(false);
        }

        for update in envelope.updates(&self.feed.hub) {
            if let Some(seq) = &update.seq {
                if !self.seen.insert(seq.clone()) {
                    debug!(topic = %update.topic, seq = %seq, "duplicate entry dropped");
                    continue;
                }
            }
            let payload = match decode_payload(&update.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(topic = %update.topic, error = %e, "dropping malformed payload");
                    continue;
                }
            };
            let record = DecodedRecord {
                topic: update.topic,
                timestamp: Utc::now(),
                payload,
            };
            recorder.append(&record)?;
            self.records_delivered += 1;
        }

        Ok(envelope.has_reference())
    }
}

/// Pends forever when no stop signal is attached, so the select branch
/// simply never fires.
async fn wait_stop(stop: &mut Option<StopSignal>) {
    match stop {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Best-effort clean close on a caller-requested stop.
async fn close_cancelled(writer: &mut FeedWriter) -> SessionError {
    info!("stop requested — closing feed connection");
    let _ = writer.close().await;
    SessionError::Cancelled
}

// =========================================================================
// Tests
// =========================================================================
