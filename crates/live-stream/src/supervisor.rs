//! 구독 감시 태스크.
//!
//! 하나의 (교차로, 종류) 구독에 대해 토픽 채널을 읽어 디코딩 후 저장소에
//! 반영하고, 전송이 끊기면 백오프 정책에 따라 새 클라이언트로 다시 엽니다.
//! 재시도를 모두 소진하면 `Failed` 상태로 끝나며, 다음 조정 단계에서 다시 열립니다.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use live_core::{subscription_span, IntersectionRef, LiveEvent, SubscriptionKey};
use live_transport::{
    ConnectionFactory, OpenedStream, ReconnectPolicy, TransportError, TransportEvent,
};

use crate::aggregator::Aggregator;

/// 구독 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SubscriptionStatus {
    /// 연결 중
    Connecting,
    /// 수신 중
    Live,
    /// 재연결 대기/시도 중
    Reconnecting { attempt: u32 },
    /// 재연결 소진. 다음 조정 단계에서 다시 열림
    Failed,
}

impl SubscriptionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SubscriptionStatus::Failed)
    }
}

enum PumpEnd {
    Cancelled,
    Closed(TransportError),
}

/// 구독 하나를 감시하는 태스크 상태.
pub(crate) struct Supervisor {
    pub key: SubscriptionKey,
    pub intersection: IntersectionRef,
    pub factory: Arc<dyn ConnectionFactory>,
    pub aggregator: Arc<Aggregator>,
    pub policy: ReconnectPolicy,
    pub cancel: CancellationToken,
    pub status: watch::Sender<SubscriptionStatus>,
}

impl Supervisor {
    /// 열린 스트림으로 감시 시작. 취소되거나 재연결을 소진할 때까지 실행됩니다.
    pub async fn run(self, stream: OpenedStream) {
        let span = subscription_span!(
            "subscription",
            self.key.intersection_id,
            self.key.kind,
            stream.topic
        );
        self.supervise(stream).instrument(span).await
    }

    async fn supervise(self, mut stream: OpenedStream) {
        self.status.send_replace(SubscriptionStatus::Live);
        debug!("Subscription live");

        loop {
            let end = self.pump(&mut stream).await;
            // 대기 중인 송신자가 바로 풀리도록 수신 측을 먼저 닫음
            stream.events.close();
            if let Err(e) = stream.client.disconnect().await {
                debug!(error = %e, "Disconnect failed");
            }

            let reason = match end {
                PumpEnd::Cancelled => {
                    debug!("Subscription cancelled");
                    return;
                }
                PumpEnd::Closed(reason) => reason,
            };

            warn!(reason = %reason, "Stream terminated");
            match self.reconnect().await {
                Some(reopened) => {
                    stream = reopened;
                    self.status.send_replace(SubscriptionStatus::Live);
                    info!("Subscription restored");
                }
                None if self.cancel.is_cancelled() => return,
                None => {
                    self.status.send_replace(SubscriptionStatus::Failed);
                    error!(
                        max_attempts = self.policy.max_attempts,
                        "Reconnect attempts exhausted, subscription failed"
                    );
                    return;
                }
            }
        }
    }

    /// 토픽 채널을 읽어 저장소에 반영.
    async fn pump(&self, stream: &mut OpenedStream) -> PumpEnd {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return PumpEnd::Cancelled,
                event = stream.events.recv() => {
                    match event {
                        Some(TransportEvent::Message(body)) => {
                            match LiveEvent::decode(self.key, &body, Utc::now()) {
                                Ok(event) => {
                                    if !self.aggregator.fold(event, &self.cancel).await {
                                        return PumpEnd::Cancelled;
                                    }
                                }
                                Err(e) => {
                                    // 메시지 하나만 버리고 구독은 유지
                                    warn!(error = %e, "Dropping undecodable message");
                                }
                            }
                        }
                        Some(TransportEvent::Closed(reason)) => {
                            return PumpEnd::Closed(TransportError::Disconnected(reason));
                        }
                        None => {
                            return PumpEnd::Closed(TransportError::Disconnected(
                                "event channel closed".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// 백오프 정책에 따라 다시 열기. 취소, 소진, 재시도 불가 에러이면 `None`.
    async fn reconnect(&self) -> Option<OpenedStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if !self.policy.allows(attempt) {
                return None;
            }

            let delay = self.policy.delay_for(attempt);
            self.status
                .send_replace(SubscriptionStatus::Reconnecting { attempt });
            info!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                opened = self.factory.open(&self.intersection, self.key.kind) => opened,
            };

            match opened {
                Ok(stream) => return Some(stream),
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "Reconnect rejected, giving up");
                    return None;
                }
                Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
            }
        }
    }
}
