//! 시뮬레이션 연결 클라이언트.
//!
//! 네트워크 없이 [`SyntheticFeed`]가 만든 JSON을 고정 주기로 토픽 채널에 보냅니다.
//! 실제 전송과 같은 [`ConnectionClient`] 인터페이스를 사용합니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use live_core::{IntersectionRef, MessageKind, SimulatorConfig, Topic};

use super::generator::SyntheticFeed;
use crate::traits::{ConnectionClient, Credentials, TransportEvent};
use crate::{TransportError, TransportResult};

/// 시뮬레이션 클라이언트.
pub struct SimulatedClient {
    name: String,
    intersection: IntersectionRef,
    config: SimulatorConfig,
    buffer: usize,
    seed: Option<u64>,
    connected: bool,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SimulatedClient {
    /// 새 시뮬레이션 클라이언트.
    pub fn new(intersection: IntersectionRef, config: SimulatorConfig, buffer: usize) -> Self {
        Self {
            name: format!("simulated-{}", intersection.intersection_id),
            intersection,
            config,
            buffer: buffer.max(1),
            seed: None,
            connected: false,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// 난수 시드 고정 (테스트용).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn period(&self, kind: MessageKind) -> Duration {
        let millis = match kind {
            MessageKind::Map => self.config.map_period_ms,
            MessageKind::Spat => self.config.spat_period_ms,
            MessageKind::Bsm => self.config.bsm_period_ms,
        };
        Duration::from_millis(millis.max(1))
    }
}

#[async_trait]
impl ConnectionClient for SimulatedClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, _credentials: &Credentials) -> TransportResult<()> {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &Topic) -> TransportResult<mpsc::Receiver<TransportEvent>> {
        if !self.connected {
            return Err(TransportError::Subscription(format!(
                "not connected: {}",
                topic
            )));
        }
        if topic.intersection_id != self.intersection.intersection_id {
            return Err(TransportError::Subscription(format!(
                "{} does not serve {}",
                self.name, topic
            )));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        let kind = topic.kind;
        let period = self.period(kind);
        let cancel = self.cancel.child_token();
        let mut feed = SyntheticFeed::new(
            self.intersection.clone(),
            self.config.vehicles_per_intersection,
            self.seed,
        );
        let topic_name = topic.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        for body in feed.next_bodies(kind, Utc::now()) {
                            // 수신 측이 읽지 않아 채널이 가득 차도 취소는 즉시 반영
                            tokio::select! {
                                _ = cancel.cancelled() => return,
                                sent = tx.send(TransportEvent::Message(body)) => {
                                    if sent.is_err() {
                                        trace!(topic = %topic_name, "Receiver dropped");
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        self.tasks.push(task);

        debug!(client = %self.name, topic = %topic, ?period, "Simulated feed started");
        Ok(rx)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.cancel.cancel();
        self.connected = false;
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        Ok(())
    }
}

impl Drop for SimulatedClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
