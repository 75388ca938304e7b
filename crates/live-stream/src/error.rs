//! 스트림 관리 에러 타입.

use thiserror::Error;

use live_core::IntersectionId;
use live_transport::TransportError;

/// 스트림 관리자 에러.
#[derive(Debug, Error)]
pub enum StreamError {
    /// 전송 계층 에러
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 교차로 구독 개설 실패
    #[error("Failed to open intersection {intersection_id}: {source}")]
    Reconcile {
        intersection_id: IntersectionId,
        #[source]
        source: TransportError,
    },

    /// 디렉토리에 없는 교차로
    #[error("Unknown intersection: {0}")]
    UnknownIntersection(IntersectionId),

    /// 종료된 관리자
    #[error("Stream manager is shut down")]
    Shutdown,
}

/// 스트림 작업을 위한 Result 타입.
pub type StreamResult<T> = Result<T, StreamError>;

impl StreamError {
    /// 해당 교차로 ID (교차로 단위 에러인 경우).
    pub fn intersection_id(&self) -> Option<IntersectionId> {
        match self {
            StreamError::Reconcile {
                intersection_id, ..
            } => Some(*intersection_id),
            StreamError::UnknownIntersection(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_error_carries_intersection() {
        let err = StreamError::Reconcile {
            intersection_id: IntersectionId(8801),
            source: TransportError::Timeout(10_000),
        };
        assert_eq!(err.intersection_id(), Some(IntersectionId(8801)));
        assert_eq!(
            err.to_string(),
            "Failed to open intersection 8801: Connection timed out after 10000 ms"
        );
        assert_eq!(StreamError::Shutdown.intersection_id(), None);
    }
}
