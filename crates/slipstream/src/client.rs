//! `FeedClient`: the reconnection supervisor callers actually start.
//!
//! The supervisor owns the outer control loop:
//!
//! ```text
//! loop {
//!     negotiate ──→ open session ──→ subscribe ──→ stream until Closed
//!       │                                             │
//!       │  Unauthorized ─────────→ FatalError (no retry can help)
//!       │  Cancelled ────────────→ Completed
//!       └─ anything else ────────→ count it, back off, go again
//! }
//! ```
//!
//! A session that delivered at least one record resets the consecutive-
//! failure count, so an isolated drop after hours of healthy streaming
//! never eats into the budget reserved for genuine failure storms.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use slipstream_protocol::TopicName;
use slipstream_session::{
    stop_pair, ConnectionSession, Recorder, SessionConfig, StopHandle, StopSignal,
};
use slipstream_transport::{AuthContext, FeedConfig, Negotiator, TransportError};

use crate::{BackoffPolicy, BuildError, FatalError};

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// One transient failure the supervisor recovered from.
#[derive(Debug, Clone)]
pub struct TransientFailure {
    /// When the failure was observed.
    pub at: DateTime<Utc>,
    /// Consecutive-failure count at that point (1-based).
    pub attempt: u32,
    /// Human-readable failure reason.
    pub reason: String,
}

/// The terminal result of a run.
///
/// Exactly one outcome — completed or a specific [`FatalError`] — plus the
/// ordered log of transient failures, which is enough to explain every
/// reconnect without digging through internal state.
#[derive(Debug)]
pub struct RunReport {
    /// `Ok(())` for a completed run (caller stop), `Err` for fatal failure.
    pub outcome: Result<(), FatalError>,
    /// Total records delivered to the recorder across all sessions.
    pub records_delivered: u64,
    /// Number of reconnect cycles performed.
    pub reconnects: u32,
    /// Transient failures in the order they occurred.
    pub transients: Vec<TransientFailure>,
}

impl RunReport {
    /// `true` when the run ended without a fatal error.
    pub fn is_completed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Consecutive-failure bookkeeping. Owned solely by the supervisor loop.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_failure: Option<String>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`FeedClient`].
///
/// # Example
///
/// ```rust,no_run
/// use slipstream::{AuthContext, BackoffPolicy, FeedClient, TopicName};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = FeedClient::builder()
///     .topic(TopicName::new("DriverList")?)
///     .topic(TopicName::new("CarData.z")?)
///     .auth(AuthContext::Anonymous)
///     .max_attempts(5)
///     .backoff(BackoffPolicy::default())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct FeedClientBuilder {
    feed: FeedConfig,
    session: SessionConfig,
    auth: AuthContext,
    topics: BTreeSet<TopicName>,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl FeedClientBuilder {
    /// Creates a builder with production feed defaults.
    pub fn new() -> Self {
        Self {
            feed: FeedConfig::default(),
            session: SessionConfig::default(),
            auth: AuthContext::Anonymous,
            topics: BTreeSet::new(),
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Overrides the feed endpoints and hub.
    pub fn feed_config(mut self, config: FeedConfig) -> Self {
        self.feed = config;
        self
    }

    /// Overrides the per-session timing knobs.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Sets the credential for the run.
    pub fn auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }

    /// Adds one topic. Duplicates collapse — subscribing twice is
    /// idempotent, not an error.
    pub fn topic(mut self, topic: TopicName) -> Self {
        self.topics.insert(topic);
        self
    }

    /// Adds many topics.
    pub fn topics(mut self, topics: impl IntoIterator<Item = TopicName>) -> Self {
        self.topics.extend(topics);
        self
    }

    /// Sets the consecutive-failure budget. Must be at least 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the reconnect backoff policy.
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    /// Returns [`BuildError`] for an empty topic set, a zero attempt
    /// budget, or an unconstructible HTTP client.
    pub fn build(self) -> Result<FeedClient, BuildError> {
        if self.topics.is_empty() {
            return Err(BuildError::NoTopics);
        }
        if self.max_attempts == 0 {
            return Err(BuildError::ZeroAttempts);
        }
        let negotiator = Negotiator::new(self.feed.clone(), self.auth.clone())
            .map_err(|e| BuildError::HttpClient(e.to_string()))?;
        let (stop_handle, stop_signal) = stop_pair();

        Ok(FeedClient {
            feed: self.feed,
            session: self.session,
            auth: self.auth,
            topics: self.topics,
            max_attempts: self.max_attempts,
            backoff: self.backoff.validated(),
            negotiator,
            stop_handle,
            stop_signal,
        })
    }
}

impl Default for FeedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

/// How one attempt (negotiate + session) ended, as the loop sees it.
enum AttemptOutcome {
    /// Caller requested a stop; the run is complete.
    Cancelled { records: u64 },
    /// The feed rejected the credential; the run is fatally over.
    Unauthorized,
    /// Anything else — a candidate for retry.
    Failed { records: u64, reason: String },
}

/// A configured recording client: the only entry point the core exposes.
///
/// All run state lives inside the instance; independent clients can run
/// concurrently in one process without sharing anything.
pub struct FeedClient {
    feed: FeedConfig,
    session: SessionConfig,
    auth: AuthContext,
    topics: BTreeSet<TopicName>,
    max_attempts: u32,
    backoff: BackoffPolicy,
    negotiator: Negotiator,
    stop_handle: StopHandle,
    stop_signal: StopSignal,
}

impl FeedClient {
    /// Creates a new builder.
    pub fn builder() -> FeedClientBuilder {
        FeedClientBuilder::new()
    }

    /// Returns a handle that stops the run from another task. Grab it
    /// before calling [`run`](Self::run) — the client is consumed there.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Runs until the caller stops it or a fatal error ends it.
    ///
    /// Decoded records stream to `recorder` in strict arrival order for
    /// as long as the run lives, across reconnects. The returned
    /// [`RunReport`] is the single terminal outcome.
    pub async fn run<R: Recorder>(self, recorder: &mut R) -> RunReport {
        let mut report = RunReport {
            outcome: Ok(()),
            records_delivered: 0,
            reconnects: 0,
            transients: Vec::new(),
        };
        let mut retry = RetryState::default();
        let mut stop = self.stop_signal.clone();

        info!(
            topics = self.topics.len(),
            max_attempts = self.max_attempts,
            "starting feed recording run"
        );

        loop {
            if stop.is_stopped() {
                info!("stop requested — run complete");
                return report;
            }

            match self.attempt(recorder, &mut stop).await {
                AttemptOutcome::Cancelled { records } => {
                    report.records_delivered += records;
                    info!(
                        records = report.records_delivered,
                        "stop requested — run complete"
                    );
                    return report;
                }
                AttemptOutcome::Unauthorized => {
                    error!("credential rejected — not retrying");
                    report.outcome = Err(FatalError::Unauthorized);
                    return report;
                }
                AttemptOutcome::Failed { records, reason } => {
                    report.records_delivered += records;
                    if records > 0 && retry.attempt > 0 {
                        info!(
                            records,
                            "session delivered data — consecutive-failure count reset"
                        );
                    }
                    if records > 0 {
                        retry.attempt = 0;
                    }
                    retry.attempt += 1;
                    retry.last_failure = Some(reason.clone());
                    report.transients.push(TransientFailure {
                        at: Utc::now(),
                        attempt: retry.attempt,
                        reason: reason.clone(),
                    });

                    if retry.attempt >= self.max_attempts {
                        error!(
                            attempts = retry.attempt,
                            last_failure = retry.last_failure.as_deref().unwrap_or("-"),
                            "retry budget exhausted"
                        );
                        report.outcome = Err(FatalError::RetriesExhausted {
                            attempts: retry.attempt,
                        });
                        return report;
                    }

                    let delay = self.backoff.delay(retry.attempt);
                    warn!(
                        attempt = retry.attempt,
                        max_attempts = self.max_attempts,
                        delay = ?delay,
                        reason = %reason,
                        "transient failure — reconnecting after backoff"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop.cancelled() => {
                            info!("stop requested during backoff — run complete");
                            return report;
                        }
                    }
                    report.reconnects += 1;
                }
            }
        }
    }

    /// One full attempt: negotiate a fresh token, run one session with it.
    async fn attempt<R: Recorder>(
        &self,
        recorder: &mut R,
        stop: &mut StopSignal,
    ) -> AttemptOutcome {
        let negotiation = tokio::select! {
            _ = stop.cancelled() => return AttemptOutcome::Cancelled { records: 0 },
            result = self.negotiator.negotiate() => match result {
                Ok(negotiation) => negotiation,
                Err(TransportError::Unauthorized) => return AttemptOutcome::Unauthorized,
                Err(e) => {
                    return AttemptOutcome::Failed {
                        records: 0,
                        reason: e.to_string(),
                    };
                }
            },
        };

        let end = ConnectionSession::new(
            &self.feed,
            &self.auth,
            self.session.clone(),
            &self.topics,
        )
        .with_stop(self.stop_signal.clone())
        .run(&negotiation.token, recorder)
        .await;

        if end.reason.is_cancelled() {
            AttemptOutcome::Cancelled {
                records: end.records_delivered,
            }
        } else {
            AttemptOutcome::Failed {
                records: end.records_delivered,
                reason: end.reason.to_string(),
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
