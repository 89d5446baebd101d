//! Integration tests for the WebSocket feed connection.
//!
//! These spin up a real tokio-tungstenite server on a loopback port and
//! drive a `FeedConnection` against it, verifying frame handling over an
//! actual socket rather than a mocked stream.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use slipstream_transport::{AuthContext, ConnectionToken, FeedConfig, FeedConnection};

type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// Accepts one WebSocket connection and hands the server side to `script`.
async fn with_feed_server<F, Fut>(script: F) -> FeedConnection
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("upgrade");
        script(ws).await;
    });

    let config = FeedConfig {
        connect_url: format!("ws://{addr}/signalr/connect"),
        ..Default::default()
    };
    FeedConnection::connect(&config, &AuthContext::Anonymous, &ConnectionToken::new("tok"))
        .await
        .expect("client should connect")
}

#[tokio::test]
async fn test_connect_and_receive_text_frame() {
    let conn = with_feed_server(|mut ws| async move {
        ws.send(Message::Text("{\"C\":\"1\"}".into())).await.unwrap();
    })
    .await;

    let (mut reader, _writer) = conn.split();
    let frame = reader.next_frame().await.unwrap();
    assert_eq!(frame.as_deref(), Some("{\"C\":\"1\"}"));
}

#[tokio::test]
async fn test_send_text_reaches_server() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let conn = with_feed_server(|mut ws| async move {
        let msg = ws.next().await.unwrap().unwrap();
        let _ = tx.send(msg.into_text().unwrap().as_str().to_owned());
    })
    .await;

    let (_reader, mut writer) = conn.split();
    writer.send_text("{\"M\":\"Subscribe\"}").await.unwrap();

    assert_eq!(rx.await.unwrap(), "{\"M\":\"Subscribe\"}");
}

#[tokio::test]
async fn test_ping_frames_are_skipped() {
    let conn = with_feed_server(|mut ws| async move {
        ws.send(Message::Ping(Vec::new().into())).await.unwrap();
        ws.send(Message::Text("after-ping".into())).await.unwrap();
    })
    .await;

    let (mut reader, _writer) = conn.split();
    // The ping must be swallowed; the next frame seen is the text one.
    let frame = reader.next_frame().await.unwrap();
    assert_eq!(frame.as_deref(), Some("after-ping"));
}

#[tokio::test]
async fn test_utf8_binary_frame_is_returned_as_text() {
    let conn = with_feed_server(|mut ws| async move {
        ws.send(Message::Binary(b"{\"R\":{}}".to_vec().into()))
            .await
            .unwrap();
    })
    .await;

    let (mut reader, _writer) = conn.split();
    let frame = reader.next_frame().await.unwrap();
    assert_eq!(frame.as_deref(), Some("{\"R\":{}}"));
}

#[tokio::test]
async fn test_server_close_yields_none() {
    let conn = with_feed_server(|mut ws| async move {
        ws.send(Message::Close(None)).await.unwrap();
    })
    .await;

    let (mut reader, _writer) = conn.split();
    let frame = reader.next_frame().await.unwrap();
    assert!(frame.is_none(), "clean close should yield None");
}

#[tokio::test]
async fn test_connect_refused_is_connect_failed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = FeedConfig {
        connect_url: format!("ws://{addr}/signalr/connect"),
        ..Default::default()
    };
    let result =
        FeedConnection::connect(&config, &AuthContext::Anonymous, &ConnectionToken::new("t"))
            .await;

    assert!(matches!(
        result,
        Err(slipstream_transport::TransportError::ConnectFailed(_))
    ));
}
