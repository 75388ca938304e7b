//! 배치 게시자.
//!
//! 활성 상태에서 고정 주기마다 최신 상태의 깊은 복사본을 만들어 모든 소비자에게
//! 게시합니다. 첫 게시는 `start()` 후 한 주기가 지난 뒤입니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::aggregator::Aggregator;

const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Ticker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// 주기 스냅샷 게시자.
pub struct BatchPublisher {
    aggregator: Arc<Aggregator>,
    period: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl BatchPublisher {
    /// 0 주기는 타이머를 만들 수 없으므로 최소 1ms로 올립니다.
    pub fn new(aggregator: Arc<Aggregator>, period: Duration) -> Self {
        Self {
            aggregator,
            period: period.max(MIN_PERIOD),
            ticker: Mutex::new(None),
        }
    }

    /// 게시 주기.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 게시 시작. 이미 활성 상태면 기존 타이머를 멈춘 뒤 새로 시작합니다.
    pub async fn start(&self) {
        let mut slot = self.ticker.lock().await;
        if let Some(previous) = slot.take() {
            Self::halt(previous).await;
            debug!("Restarting batch publisher");
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run(
            self.aggregator.clone(),
            self.period,
            cancel.clone(),
        ));
        *slot = Some(Ticker { cancel, task });

        info!(period_ms = self.period.as_millis() as u64, "Batch publisher started");
    }

    /// 게시 중지. 반환 이후에는 스냅샷이 게시되지 않습니다.
    pub async fn stop(&self) -> bool {
        match self.ticker.lock().await.take() {
            Some(ticker) => {
                Self::halt(ticker).await;
                info!("Batch publisher stopped");
                true
            }
            None => false,
        }
    }

    /// 활성 상태인지 확인.
    pub async fn is_active(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    async fn halt(ticker: Ticker) {
        ticker.cancel.cancel();
        if let Err(e) = ticker.task.await {
            debug!(error = %e, "Publisher task ended abnormally");
        }
    }

    async fn run(aggregator: Arc<Aggregator>, period: Duration, cancel: CancellationToken) {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticks.tick() => {
                    let snapshot = aggregator.publish_snapshot().await;
                    trace!(
                        maps = snapshot.maps.len(),
                        spats = snapshot.spats.len(),
                        vehicles = snapshot.vehicle_count(),
                        "Snapshot published"
                    );
                }
            }
        }
    }
}

impl Drop for BatchPublisher {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.cancel.cancel();
            ticker.task.abort();
        }
    }
}
