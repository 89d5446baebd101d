//! Transport layer for the Slipstream feed client.
//!
//! Two one-directional concerns live here:
//!
//! - [`Negotiator`] — the one-shot HTTP handshake that trades a credential
//!   for a [`ConnectionToken`].
//! - [`FeedConnection`] — the persistent WebSocket carrying the subscribe
//!   invocation outbound and the envelope stream inbound.
//!
//! Endpoints, hub name and protocol version are data ([`FeedConfig`]), not
//! constants baked into the code — the same client records from a mock feed
//! in tests and from the production feed in anger.

mod error;
mod negotiate;
mod websocket;

pub use error::TransportError;
pub use negotiate::{ConnectionToken, Negotiation, Negotiator};
pub use websocket::{FeedConnection, FeedReader, FeedWriter};

use tokio_tungstenite::tungstenite::http::{header, HeaderMap, HeaderValue};

/// User-agent the feed expects. The production endpoint serves the
/// official timing app and rejects some requests without it.
pub const FEED_USER_AGENT: &str = "BestHTTP";

// ---------------------------------------------------------------------------
// FeedConfig
// ---------------------------------------------------------------------------

/// Where and how to reach the feed.
///
/// Defaults point at the production live timing service; tests override
/// both URLs with loopback mock servers.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// HTTP(S) endpoint for the negotiation request.
    pub negotiate_url: String,
    /// WS(S) endpoint for the persistent connection.
    pub connect_url: String,
    /// Hub whose `feed` invocations carry topic data.
    pub hub: String,
    /// Protocol version sent as `clientProtocol` on both requests.
    pub client_protocol: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            negotiate_url: "https://livetiming.formula1.com/signalr/negotiate".to_string(),
            connect_url: "wss://livetiming.formula1.com/signalr/connect".to_string(),
            hub: "Streaming".to_string(),
            client_protocol: "1.5".to_string(),
        }
    }
}

impl FeedConfig {
    /// The `connectionData` query value: the hub registration list both
    /// requests must carry.
    pub fn connection_data(&self) -> String {
        serde_json::json!([{ "name": self.hub }]).to_string()
    }
}

// ---------------------------------------------------------------------------
// AuthContext
// ---------------------------------------------------------------------------

/// The credential to attach to feed requests.
///
/// Exactly one variant is active per run. The core never *acquires*
/// credentials — reading env vars or driving a browser login happens
/// outside — and never validates them locally; a bad credential surfaces
/// as [`TransportError::Unauthorized`] when the feed refuses it.
#[derive(Debug, Clone, Default)]
pub enum AuthContext {
    /// No credential. The feed serves a reduced topic set anonymously.
    #[default]
    Anonymous,

    /// Static bearer token, attached as `Authorization: Bearer …`.
    Bearer(String),

    /// Opaque session cookie value from an interactive login, attached
    /// verbatim as the `Cookie` header.
    SessionCookie(String),
}

impl AuthContext {
    /// Attaches the credential to an outgoing HTTP request.
    pub(crate) fn apply_request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Anonymous => req,
            Self::Bearer(token) => req.bearer_auth(token),
            Self::SessionCookie(cookie) => req.header(reqwest::header::COOKIE, cookie),
        }
    }

    /// Attaches the credential to the WebSocket upgrade request headers.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] if the credential contains
    /// bytes that cannot appear in an HTTP header.
    pub(crate) fn apply_headers(&self, headers: &mut HeaderMap) -> Result<(), TransportError> {
        let (name, value) = match self {
            Self::Anonymous => return Ok(()),
            Self::Bearer(token) => (header::AUTHORIZATION, format!("Bearer {token}")),
            Self::SessionCookie(cookie) => (header::COOKIE, cookie.clone()),
        };
        let value = HeaderValue::from_str(&value)
            .map_err(|e| TransportError::ConnectFailed(format!("credential not header-safe: {e}")))?;
        headers.insert(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_data_wraps_hub_name() {
        let config = FeedConfig {
            hub: "Streaming".into(),
            ..Default::default()
        };
        assert_eq!(config.connection_data(), r#"[{"name":"Streaming"}]"#);
    }

    #[test]
    fn test_auth_bearer_sets_authorization_header() {
        let mut headers = HeaderMap::new();
        AuthContext::Bearer("tok".into())
            .apply_headers(&mut headers)
            .unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_auth_cookie_sets_cookie_header() {
        let mut headers = HeaderMap::new();
        AuthContext::SessionCookie("login-session=abc".into())
            .apply_headers(&mut headers)
            .unwrap();
        assert_eq!(headers[header::COOKIE], "login-session=abc");
    }

    #[test]
    fn test_auth_anonymous_sets_nothing() {
        let mut headers = HeaderMap::new();
        AuthContext::Anonymous.apply_headers(&mut headers).unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_auth_header_unsafe_credential_is_rejected() {
        let mut headers = HeaderMap::new();
        let result =
            AuthContext::Bearer("tok\nInjected: yes".into()).apply_headers(&mut headers);
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
