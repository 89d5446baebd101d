//! Terminal error types for the supervisor.

/// Why a run ended in failure.
///
/// A run produces exactly one terminal outcome: completion (caller stop or
/// clean end) or one of these. Everything transient along the way is in
/// the run report's failure log, not here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FatalError {
    /// The feed rejected the supplied credential. Never retried — handing
    /// the same rejected credential back to the feed cannot succeed and
    /// would only hide the real problem behind a retry storm.
    #[error("feed rejected the supplied credential")]
    Unauthorized,

    /// Consecutive failures exhausted the retry budget.
    #[error("retry budget exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Consecutive failed attempts at the moment the budget ran out.
        attempts: u32,
    },
}

/// Configuration problems caught before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The topic set was empty — there is nothing to record.
    #[error("at least one topic is required")]
    NoTopics,

    /// `max_attempts` was zero, which would forbid even the first attempt.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// The HTTP client for negotiation could not be constructed.
    #[error("http client: {0}")]
    HttpClient(String),
}
