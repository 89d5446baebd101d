//! The one-shot negotiation handshake.
//!
//! Before a persistent connection can be opened the client performs one
//! HTTP GET against the feed's `negotiate` endpoint and receives a
//! connection token plus transport hints. Each call yields an independent
//! token; tokens are single-use and never survive a disconnect.

use serde::Deserialize;

use crate::{AuthContext, FeedConfig, TransportError, FEED_USER_AGENT};

// ---------------------------------------------------------------------------
// ConnectionToken
// ---------------------------------------------------------------------------

/// Opaque token returned by negotiation.
///
/// Owned by exactly one connection attempt. Intentionally has no `Display`
/// impl — the token authenticates the WebSocket upgrade and does not
/// belong in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionToken(String);

impl ConnectionToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for the connect query.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

/// Successful negotiation result.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// Token to present when opening the persistent connection.
    pub token: ConnectionToken,
    /// Protocol version the server reported, if any.
    pub protocol_version: Option<String>,
}

/// Response body of the negotiate endpoint. Field names are the feed's
/// contract, not ours.
#[derive(Debug, Deserialize)]
struct NegotiateResponse {
    #[serde(rename = "ConnectionToken")]
    connection_token: Option<String>,
    #[serde(rename = "ProtocolVersion")]
    protocol_version: Option<String>,
}

// ---------------------------------------------------------------------------
// Negotiator
// ---------------------------------------------------------------------------

/// Performs the negotiation handshake.
///
/// Holds a reusable HTTP client; [`negotiate`](Self::negotiate) is
/// idempotent and safe to call once per reconnect attempt.
pub struct Negotiator {
    config: FeedConfig,
    auth: AuthContext,
    http: reqwest::Client,
}

impl Negotiator {
    /// Creates a negotiator for the given feed and credential.
    ///
    /// # Errors
    /// Returns [`TransportError::Negotiate`] if the HTTP client cannot be
    /// constructed (TLS backend initialization).
    pub fn new(config: FeedConfig, auth: AuthContext) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(FEED_USER_AGENT)
            .build()
            .map_err(|e| TransportError::Negotiate(format!("http client: {e}")))?;
        Ok(Self { config, auth, http })
    }

    /// Requests a fresh connection token from the feed.
    ///
    /// # Errors
    /// - [`TransportError::Unauthorized`] on HTTP 401/403 — the supervisor
    ///   must not retry these.
    /// - [`TransportError::Unreachable`] on network-level failure.
    /// - [`TransportError::Negotiate`] on any other unusable response.
    pub async fn negotiate(&self) -> Result<Negotiation, TransportError> {
        let request = self
            .http
            .get(&self.config.negotiate_url)
            .query(&[
                ("clientProtocol", self.config.client_protocol.as_str()),
                ("connectionData", self.config.connection_data().as_str()),
            ]);
        let request = self.auth.apply_request(request);

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            return Err(TransportError::Negotiate(format!(
                "unexpected status {status}"
            )));
        }

        let body: NegotiateResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Negotiate(format!("malformed body: {e}")))?;

        let token = body
            .connection_token
            .ok_or_else(|| TransportError::Negotiate("response missing ConnectionToken".into()))?;

        tracing::debug!(
            protocol_version = body.protocol_version.as_deref().unwrap_or("-"),
            "negotiation complete"
        );

        Ok(Negotiation {
            token: ConnectionToken::new(token),
            protocol_version: body.protocol_version,
        })
    }
}
