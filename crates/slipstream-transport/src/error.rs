//! Error types for the transport layer.

/// Errors that can occur while negotiating or carrying the feed connection.
///
/// [`Unauthorized`](TransportError::Unauthorized) is kept distinct from
/// [`Unreachable`](TransportError::Unreachable) because the supervisor
/// treats them differently: a rejected credential can never be fixed by
/// retrying, a network failure usually can.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The feed rejected the supplied credential (HTTP 401/403).
    #[error("feed rejected the supplied credential")]
    Unauthorized,

    /// The negotiation endpoint could not be reached at the network level.
    #[error("negotiation endpoint unreachable: {0}")]
    Unreachable(String),

    /// Negotiation reached the feed but did not produce a usable token
    /// (unexpected status, malformed body, missing token).
    #[error("negotiation failed: {0}")]
    Negotiate(String),

    /// The WebSocket connection could not be opened.
    #[error("websocket connect failed: {0}")]
    ConnectFailed(String),

    /// Sending on the open connection failed.
    #[error("websocket send failed: {0}")]
    SendFailed(String),

    /// Receiving on the open connection failed.
    #[error("websocket receive failed: {0}")]
    ReceiveFailed(String),
}
