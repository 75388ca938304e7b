//! STOMP over WebSocket 연결 클라이언트.
//!
//! 세션이 수립되면 드라이버 태스크가 WebSocket 읽기/쓰기를 소유하고,
//! `subscription` 헤더로 MESSAGE 프레임을 토픽 채널에 라우팅합니다.
//! ERROR 프레임이나 전송 종료는 세션을 끝내며 모든 토픽 채널에 종료를 통지합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use live_core::Topic;

use super::frame::{decode_frames, Frame, StompCommand};
use crate::traits::{ConnectionClient, Credentials, TransportEvent};
use crate::{TransportError, TransportResult};

/// 대시보드가 요청하는 STOMP 서브프로토콜.
const STOMP_SUBPROTOCOLS: &str = "v10.stomp, v11.stomp";

/// DISCONNECT 후 드라이버 종료 대기 시간.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

enum Command {
    Subscribe {
        id: String,
        destination: String,
        events: mpsc::Sender<TransportEvent>,
    },
    Disconnect,
}

struct Session {
    commands: mpsc::Sender<Command>,
    alive: Arc<AtomicBool>,
    driver: JoinHandle<()>,
}

/// STOMP 클라이언트.
pub struct StompClient {
    name: String,
    url: String,
    ping_interval: Duration,
    buffer: usize,
    session: Option<Session>,
    next_subscription: u32,
}

impl StompClient {
    /// 새 클라이언트 생성 (아직 연결하지 않음).
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        ping_interval: Duration,
        buffer: usize,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ping_interval,
            buffer: buffer.max(1),
            session: None,
            next_subscription: 0,
        }
    }

    /// 접속 URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn protocols(credentials: &Credentials) -> String {
        match credentials.token() {
            Some(token) => format!("{}, {}", STOMP_SUBPROTOCOLS, token),
            None => STOMP_SUBPROTOCOLS.to_string(),
        }
    }
}

#[async_trait]
impl ConnectionClient for StompClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(|session| session.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    async fn connect(&mut self, credentials: &Credentials) -> TransportResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        // 끝난 세션 정리
        if let Some(stale) = self.session.take() {
            stale.driver.abort();
        }

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connection(format!("invalid url {}: {}", self.url, e)))?;
        let protocols = HeaderValue::from_str(&Self::protocols(credentials))
            .map_err(|e| TransportError::Connection(format!("invalid token header: {}", e)))?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, protocols);
        let host = request.uri().host().unwrap_or_default().to_string();

        info!(client = %self.name, url = %self.url, "Connecting to STOMP endpoint");

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connection(format!("WebSocket 연결 실패: {}", e)))?;
        let (mut write, mut read) = ws.split();

        let connect = Frame::new(StompCommand::Connect)
            .header("accept-version", "1.0,1.1")
            .header("host", host)
            .header("heart-beat", "0,0");
        write
            .send(Message::Text(connect.encode()))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        await_connected(&mut write, &mut read).await?;

        let (commands, command_rx) = mpsc::channel(32);
        let alive = Arc::new(AtomicBool::new(true));
        let driver = tokio::spawn(drive(
            self.name.clone(),
            write,
            read,
            command_rx,
            alive.clone(),
            self.ping_interval,
        ));

        self.session = Some(Session {
            commands,
            alive,
            driver,
        });

        info!(client = %self.name, "STOMP session established");
        Ok(())
    }

    async fn subscribe(&mut self, topic: &Topic) -> TransportResult<mpsc::Receiver<TransportEvent>> {
        let session = self
            .session
            .as_ref()
            .filter(|session| session.alive.load(Ordering::SeqCst))
            .ok_or_else(|| TransportError::Subscription(format!("not connected: {}", topic)))?;

        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;

        let (events, rx) = mpsc::channel(self.buffer);
        session
            .commands
            .send(Command::Subscribe {
                id: id.clone(),
                destination: topic.to_string(),
                events,
            })
            .await
            .map_err(|_| TransportError::Subscription(format!("session closed: {}", topic)))?;

        debug!(client = %self.name, topic = %topic, id = %id, "Subscribed");
        Ok(rx)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        let _ = session.commands.send(Command::Disconnect).await;
        let mut driver = session.driver;
        if tokio::time::timeout(DISCONNECT_GRACE, &mut driver)
            .await
            .is_err()
        {
            driver.abort();
        }

        debug!(client = %self.name, "Disconnected");
        Ok(())
    }
}

impl Drop for StompClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.driver.abort();
        }
    }
}

/// CONNECTED 프레임까지 대기.
async fn await_connected(write: &mut WsSink, read: &mut WsSource) -> TransportResult<()> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                for frame in decode_frames(&text)? {
                    match frame.command {
                        StompCommand::Connected => {
                            debug!(version = ?frame.get("version"), "CONNECTED received");
                            return Ok(());
                        }
                        StompCommand::Error => {
                            return Err(TransportError::Connection(format!(
                                "STOMP handshake rejected: {}",
                                frame.get("message").unwrap_or(&frame.body)
                            )));
                        }
                        other => debug!(command = %other, "Ignoring frame before CONNECTED"),
                    }
                }
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::Connection(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(TransportError::Connection(e.to_string())),
        }
    }
}

/// 세션 드라이버: 수신 라우팅, 명령 처리, ping 전송.
async fn drive(
    name: String,
    mut write: WsSink,
    mut read: WsSource,
    mut commands: mpsc::Receiver<Command>,
    alive: Arc<AtomicBool>,
    ping_every: Duration,
) {
    let mut routes: HashMap<String, mpsc::Sender<TransportEvent>> = HashMap::new();

    let mut ping = interval(ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ping.tick().await;

    let reason: String;
    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(terminal) = route_frames(&name, &text, &mut routes).await {
                            reason = terminal;
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        reason = "server closed the connection".to_string();
                        break;
                    }
                    Some(Err(e)) => {
                        reason = format!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        reason = "stream ended".to_string();
                        break;
                    }
                    _ => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Subscribe { id, destination, events }) => {
                        let frame = Frame::new(StompCommand::Subscribe)
                            .header("id", id.clone())
                            .header("destination", destination)
                            .header("ack", "auto");
                        if let Err(e) = write.send(Message::Text(frame.encode())).await {
                            let _ = events.send(TransportEvent::Closed(e.to_string())).await;
                            reason = format!("SUBSCRIBE failed: {}", e);
                            break;
                        }
                        routes.insert(id, events);
                    }
                    Some(Command::Disconnect) | None => {
                        let frame = Frame::new(StompCommand::Disconnect);
                        let _ = write.send(Message::Text(frame.encode())).await;
                        let _ = write.close().await;
                        alive.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    reason = format!("ping failed: {}", e);
                    break;
                }
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    warn!(client = %name, reason = %reason, "STOMP session terminated");

    for (_, events) in routes.drain() {
        let _ = events.send(TransportEvent::Closed(reason.clone())).await;
    }
}

/// 수신 텍스트의 프레임을 토픽 채널로 전달. 세션 종료 사유가 있으면 반환.
async fn route_frames(
    name: &str,
    text: &str,
    routes: &mut HashMap<String, mpsc::Sender<TransportEvent>>,
) -> Option<String> {
    let frames = match decode_frames(text) {
        Ok(frames) => frames,
        Err(e) => return Some(e.to_string()),
    };

    for frame in frames {
        match frame.command {
            StompCommand::Message => {
                let Some(id) = frame.get("subscription").map(str::to_string) else {
                    debug!(client = %name, "MESSAGE without subscription header");
                    continue;
                };
                let Some(events) = routes.get(&id) else {
                    continue;
                };
                if events.send(TransportEvent::Message(frame.body)).await.is_err() {
                    // 수신자가 사라진 토픽
                    routes.remove(&id);
                }
            }
            StompCommand::Error => {
                return Some(format!(
                    "STOMP ERROR: {}",
                    frame.get("message").unwrap_or(&frame.body)
                ));
            }
            other => debug!(client = %name, command = %other, "Ignoring frame"),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocols_include_token() {
        assert_eq!(
            StompClient::protocols(&Credentials::anonymous()),
            "v10.stomp, v11.stomp"
        );
        assert_eq!(
            StompClient::protocols(&Credentials::bearer("Bearer t0k")),
            "v10.stomp, v11.stomp, Bearer t0k"
        );
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let mut client = StompClient::new("test", "ws://127.0.0.1:1/stomp", Duration::from_secs(30), 8);
        let topic = Topic::parse("/live/-1/8801/map").unwrap();

        let err = client.subscribe(&topic).await.unwrap_err();
        assert!(matches!(err, TransportError::Subscription(_)));
        assert!(client.disconnect().await.is_ok());
        assert!(client.disconnect().await.is_ok());
    }
}
