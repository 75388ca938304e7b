//! 연결 클라이언트 trait 정의.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use live_core::{IntersectionRef, MessageKind, Topic, TransportConfig};

use crate::{TransportError, TransportResult};

/// 연결 자격증명 (bearer 토큰).
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Option<Arc<SecretString>>,
}

impl Credentials {
    /// 토큰 없이 연결.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// bearer 토큰으로 연결.
    pub fn bearer(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self {
            token: Some(Arc::new(SecretString::new(token.into()))),
        }
    }

    /// 전송 설정에서 자격증명 생성.
    pub fn from_config(config: &TransportConfig) -> Self {
        match config.token.as_deref() {
            Some(token) if !token.is_empty() => Self::bearer(token),
            _ => Self::anonymous(),
        }
    }

    /// 토큰 원문 (핸드셰이크 시에만 사용).
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(|secret| secret.expose_secret())
    }
}

/// 토픽 채널로 전달되는 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 원본 메시지 본문 (UTF-8 JSON)
    Message(String),
    /// 전송 종료 통지. 이후 이 채널에는 메시지가 오지 않습니다.
    Closed(String),
}

/// 하나의 교차로 피드에 대한 실시간 연결.
///
/// 토픽별 메시지 순서는 보장되지만 토픽 간 순서는 보장되지 않습니다.
/// 연결이 끊기면 열린 모든 토픽 채널에 [`TransportEvent::Closed`]를 보내고
/// 더 이상 전달하지 않습니다. 클라이언트 스스로 재연결하지 않습니다.
#[async_trait]
pub trait ConnectionClient: Send {
    /// 클라이언트 이름 (로그용).
    fn name(&self) -> &str;

    /// 세션이 살아 있는지 확인.
    fn is_connected(&self) -> bool;

    /// 세션 수립.
    async fn connect(&mut self, credentials: &Credentials) -> TransportResult<()>;

    /// 토픽 구독. 연결되지 않았으면 실패합니다.
    async fn subscribe(&mut self, topic: &Topic) -> TransportResult<mpsc::Receiver<TransportEvent>>;

    /// 연결 해제. 여러 번 호출해도 안전합니다.
    async fn disconnect(&mut self) -> TransportResult<()>;
}

/// 연결 + 구독까지 완료된 스트림.
pub struct OpenedStream {
    pub topic: Topic,
    pub client: Box<dyn ConnectionClient>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedStream")
            .field("topic", &self.topic.to_string())
            .field("client", &self.client.name())
            .finish()
    }
}

/// 교차로/종류별 연결 클라이언트 팩토리.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// 연결되지 않은 새 클라이언트 생성.
    fn create(
        &self,
        intersection: &IntersectionRef,
        kind: MessageKind,
    ) -> TransportResult<Box<dyn ConnectionClient>>;

    /// 토픽 루트 (`/live/...`의 `live`).
    fn stream_root(&self) -> &str;

    /// 핸드셰이크에 사용할 자격증명.
    fn credentials(&self) -> Credentials {
        Credentials::anonymous()
    }

    /// 연결 수립 제한 시간.
    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// 클라이언트를 만들고 연결한 뒤 토픽을 구독.
    ///
    /// 연결은 [`connect_timeout`](Self::connect_timeout) 안에 끝나야 하며,
    /// 구독이 실패하면 클라이언트를 정리한 뒤 에러를 반환합니다.
    async fn open(
        &self,
        intersection: &IntersectionRef,
        kind: MessageKind,
    ) -> TransportResult<OpenedStream> {
        let topic = intersection.topic(self.stream_root(), kind);
        let mut client = self.create(intersection, kind)?;
        let credentials = self.credentials();
        let timeout = self.connect_timeout();

        let connected = tokio::time::timeout(timeout, client.connect(&credentials)).await;
        match connected {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                let _ = client.disconnect().await;
                return Err(TransportError::Timeout(timeout.as_millis() as u64));
            }
        }

        match client.subscribe(&topic).await {
            Ok(events) => {
                debug!(topic = %topic, client = client.name(), "Stream opened");
                Ok(OpenedStream {
                    topic,
                    client,
                    events,
                })
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Subscribe failed, closing client");
                let _ = client.disconnect().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_from_config() {
        let mut config = TransportConfig::default();
        assert!(Credentials::from_config(&config).token().is_none());

        config.token = Some(String::new());
        assert!(Credentials::from_config(&config).token().is_none());

        config.token = Some("Bearer abc".to_string());
        let credentials = Credentials::from_config(&config);
        assert_eq!(credentials.token(), Some("Bearer abc"));
        assert!(!format!("{:?}", credentials).contains("abc"));
    }
}
