//! 핵심 도메인 에러 타입.

use thiserror::Error;

use crate::types::MessageKind;

/// 도메인 계층 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 페이로드가 메시지 종류의 스키마와 맞지 않음
    #[error("Failed to decode {kind} payload: {message}")]
    Decode { kind: MessageKind, message: String },

    /// 토픽 형식 오류
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// 뷰포트 경계 형식 오류
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 디코딩 에러 생성.
    pub fn decode(kind: MessageKind, err: impl std::fmt::Display) -> Self {
        CoreError::Decode {
            kind,
            message: err.to_string(),
        }
    }

    /// 개별 메시지만 버리면 되는 에러인지 확인.
    pub fn is_message_local(&self) -> bool {
        matches!(self, CoreError::Decode { .. })
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_is_message_local() {
        let err = CoreError::decode(MessageKind::Bsm, "missing field `id`");
        assert!(err.is_message_local());
        assert_eq!(
            err.to_string(),
            "Failed to decode bsm payload: missing field `id`"
        );

        let topic_err = CoreError::InvalidTopic("/live/x".to_string());
        assert!(!topic_err.is_message_local());
    }
}
