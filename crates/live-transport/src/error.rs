//! 전송 계층 에러 타입.

use thiserror::Error;

/// 실시간 연결 관련 에러.
#[derive(Debug, Error)]
pub enum TransportError {
    /// 핸드셰이크/전송 실패
    #[error("Connection error: {0}")]
    Connection(String),

    /// 구독 거부
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// 연결 수립 타임아웃
    #[error("Connection timed out after {0} ms")]
    Timeout(u64),

    /// STOMP 프레임 형식 오류 또는 서버 ERROR 프레임
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),
}

/// 전송 작업을 위한 Result 타입.
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// 같은 서버로 다시 연결하면 해결될 수 있는 에러인지 확인.
    ///
    /// 구독 거부나 프로토콜 오류는 백오프로 해결되지 않으므로 재연결을 멈춥니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_)
                | TransportError::Timeout(_)
                | TransportError::WebSocket(_)
                | TransportError::Disconnected(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(TransportError::Timeout(10_000).is_retryable());
        assert!(TransportError::Disconnected("reset".into()).is_retryable());
        assert!(!TransportError::Subscription("rejected".into()).is_retryable());
        assert!(!TransportError::Protocol("bad frame".into()).is_retryable());
        assert_eq!(
            TransportError::Timeout(10_000).to_string(),
            "Connection timed out after 10000 ms"
        );
    }
}
