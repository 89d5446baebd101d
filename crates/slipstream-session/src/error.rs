//! Error types for the session layer.

use std::time::Duration;

use crate::SinkError;

/// The reason a session closed.
///
/// Every session ends with one of these — there is no "still running"
/// ambiguity for the supervisor to interpret. Only the supervisor decides
/// what happens next: the session itself never retries.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The persistent connection could not be opened, or broke before the
    /// subscribe invocation was on the wire.
    #[error("failed to open feed connection: {0}")]
    ConnectFailed(String),

    /// The feed never acknowledged the subscribe invocation with
    /// reference data.
    #[error("no subscribe acknowledgement within {0:?}")]
    SubscribeTimeout(Duration),

    /// Nothing arrived for the configured silence window; the connection
    /// is presumed dead even though the socket is nominally open.
    #[error("feed silent for {0:?}")]
    Idle(Duration),

    /// The open connection broke mid-stream.
    #[error("feed connection lost: {0}")]
    ConnectionLost(String),

    /// The recorder refused a record. Recording failures are never
    /// swallowed — losing data defeats the point of the client.
    #[error("recorder sink failure: {0}")]
    SinkFailure(#[from] SinkError),

    /// The caller requested a stop. Treated as terminal success upstream,
    /// not as a failure to retry.
    #[error("stop requested")]
    Cancelled,
}

impl SessionError {
    /// `true` for the caller-requested stop, which the supervisor maps to
    /// a completed run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
