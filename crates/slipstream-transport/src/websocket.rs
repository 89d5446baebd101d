//! WebSocket feed connection using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

use crate::{AuthContext, ConnectionToken, FeedConfig, TransportError, FEED_USER_AGENT};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Builds the upgrade request for the persistent connection.
fn connect_request(
    config: &FeedConfig,
    auth: &AuthContext,
    token: &ConnectionToken,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, TransportError> {
    let url = reqwest::Url::parse_with_params(
        &config.connect_url,
        [
            ("transport", "webSockets"),
            ("clientProtocol", config.client_protocol.as_str()),
            ("connectionToken", token.as_str()),
            ("connectionData", config.connection_data().as_str()),
        ],
    )
    .map_err(|e| TransportError::ConnectFailed(format!("connect url: {e}")))?;

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
    request
        .headers_mut()
        .insert(header::USER_AGENT, HeaderValue::from_static(FEED_USER_AGENT));
    auth.apply_headers(request.headers_mut())?;
    Ok(request)
}

/// One open persistent connection to the feed.
///
/// Split into a [`FeedReader`] and [`FeedWriter`] before streaming, so the
/// read loop and the keep-alive sender can live in separate `select!`
/// branches without sharing a lock.
pub struct FeedConnection {
    stream: WsStream,
}

impl FeedConnection {
    /// Opens the persistent connection with a negotiated token.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] if the URL is unusable or
    /// the upgrade is refused.
    pub async fn connect(
        config: &FeedConfig,
        auth: &AuthContext,
        token: &ConnectionToken,
    ) -> Result<Self, TransportError> {
        let request = connect_request(config, auth, token)?;
        tracing::debug!(url = %config.connect_url, "opening feed connection");
        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        Ok(Self { stream })
    }

    /// Splits the connection into its read and write halves.
    pub fn split(self) -> (FeedReader, FeedWriter) {
        let (sink, stream) = self.stream.split();
        (FeedReader { stream }, FeedWriter { sink })
    }
}

/// Read half: yields inbound text frames.
pub struct FeedReader {
    stream: SplitStream<WsStream>,
}

impl FeedReader {
    /// Waits for the next text frame.
    ///
    /// Ping/pong control frames are handled transparently; binary frames
    /// are returned as text when they hold valid UTF-8 and skipped
    /// otherwise. Returns `Ok(None)` when the connection is cleanly closed.
    ///
    /// # Errors
    /// Returns [`TransportError::ReceiveFailed`] on a broken connection.
    pub async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => continue,
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }
}

/// Write half: the single writer for this connection.
pub struct FeedWriter {
    sink: SplitSink<WsStream, Message>,
}

impl FeedWriter {
    /// Sends one text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Sends a keep-alive ping.
    pub async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Initiates a clean close of the connection.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_carries_token_and_transport() {
        let config = FeedConfig {
            connect_url: "ws://127.0.0.1:9000/signalr/connect".into(),
            ..Default::default()
        };
        let request = connect_request(
            &config,
            &AuthContext::Anonymous,
            &ConnectionToken::new("tok 1"),
        )
        .unwrap();

        let uri = request.uri().to_string();
        assert!(uri.contains("transport=webSockets"));
        assert!(uri.contains("clientProtocol=1.5"));
        // Url encoding must make the token query-safe.
        assert!(uri.contains("connectionToken=tok+1") || uri.contains("connectionToken=tok%201"));
        assert_eq!(request.headers()[header::USER_AGENT], FEED_USER_AGENT);
    }

    #[test]
    fn test_connect_request_attaches_bearer_credential() {
        let config = FeedConfig {
            connect_url: "ws://127.0.0.1:9000/signalr/connect".into(),
            ..Default::default()
        };
        let request = connect_request(
            &config,
            &AuthContext::Bearer("secret".into()),
            &ConnectionToken::new("t"),
        )
        .unwrap();
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn test_connect_request_rejects_malformed_url() {
        let config = FeedConfig {
            connect_url: "not a url".into(),
            ..Default::default()
        };
        let result = connect_request(
            &config,
            &AuthContext::Anonymous,
            &ConnectionToken::new("t"),
        );
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
