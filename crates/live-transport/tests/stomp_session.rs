//! STOMP 클라이언트와 로컬 WebSocket 서버 간 세션 테스트.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use live_core::Topic;
use live_transport::stomp::{decode_frames, Frame, StompCommand};
use live_transport::{ConnectionClient, Credentials, StompClient, TransportError, TransportEvent};

/// 서버 측 시나리오.
enum Script {
    /// CONNECTED 후 MESSAGE 하나를 보내고 연결을 닫음
    MessageThenClose,
    /// CONNECT를 ERROR로 거부
    RejectConnect,
}

async fn serve_once(script: Script) -> (String, tokio::task::JoinHandle<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut offered = None;
        let callback = |req: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
            offered = req
                .headers()
                .get(SEC_WEBSOCKET_PROTOCOL)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            response
                .headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("v11.stomp"));
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        // CONNECT
        let connect = match ws.next().await {
            Some(Ok(Message::Text(text))) => decode_frames(&text).unwrap().remove(0),
            other => panic!("expected CONNECT, got {:?}", other),
        };
        assert_eq!(connect.command, StompCommand::Connect);
        assert_eq!(connect.get("accept-version"), Some("1.0,1.1"));

        match script {
            Script::RejectConnect => {
                let error = Frame::new(StompCommand::Error).header("message", "bad token");
                ws.send(Message::Text(error.encode())).await.unwrap();
                let _ = ws.close(None).await;
            }
            Script::MessageThenClose => {
                let connected = Frame::new(StompCommand::Connected).header("version", "1.1");
                ws.send(Message::Text(connected.encode())).await.unwrap();

                // SUBSCRIBE
                let subscribe = loop {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => {
                            let mut frames = decode_frames(&text).unwrap();
                            if !frames.is_empty() {
                                break frames.remove(0);
                            }
                        }
                        Some(Ok(_)) => continue,
                        other => panic!("expected SUBSCRIBE, got {:?}", other),
                    }
                };
                assert_eq!(subscribe.command, StompCommand::Subscribe);
                assert_eq!(subscribe.get("destination"), Some("/live/-1/8801/spat"));
                let id = subscribe.get("id").unwrap().to_string();

                // heart-beat EOL + MESSAGE
                ws.send(Message::Text("\n".to_string())).await.unwrap();
                let message = Frame::new(StompCommand::Message)
                    .header("subscription", id)
                    .header("destination", "/live/-1/8801/spat")
                    .header("message-id", "1")
                    .body(r#"{"intersectionId":8801,"states":[]}"#);
                ws.send(Message::Text(message.encode())).await.unwrap();

                let _ = ws.close(None).await;
            }
        }

        offered
    });

    (format!("ws://{}/stomp", addr), handle)
}

#[tokio::test]
async fn test_session_routes_message_then_reports_closure() {
    let (url, server) = serve_once(Script::MessageThenClose).await;
    let mut client = StompClient::new("test-8801-spat", url, Duration::from_secs(30), 16);

    client
        .connect(&Credentials::bearer("Bearer abc"))
        .await
        .expect("handshake");
    assert!(client.is_connected());

    let topic = Topic::parse("/live/-1/8801/spat").unwrap();
    let mut events = client.subscribe(&topic).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap();
    assert_eq!(
        first,
        Some(TransportEvent::Message(
            r#"{"intersectionId":8801,"states":[]}"#.to_string()
        ))
    );

    let second = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap();
    assert!(matches!(second, Some(TransportEvent::Closed(_))));
    assert!(!client.is_connected());

    let offered = server.await.unwrap().unwrap();
    assert_eq!(offered, "v10.stomp, v11.stomp, Bearer abc");

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_handshake_error_frame_is_connection_error() {
    let (url, server) = serve_once(Script::RejectConnect).await;
    let mut client = StompClient::new("test-reject", url, Duration::from_secs(30), 16);

    let err = client.connect(&Credentials::anonymous()).await.unwrap_err();
    assert!(matches!(err, TransportError::Connection(_)));
    assert!(err.to_string().contains("bad token"));
    assert!(!client.is_connected());

    let offered = server.await.unwrap().unwrap();
    assert_eq!(offered, "v10.stomp, v11.stomp");
}
