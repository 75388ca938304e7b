//! 실시간 교차로 스트림 관리자.
//!
//! 레지스트리, 조정기, 저장소, 게시자, 소비자 허브를 하나로 묶는 진입점입니다.
//! 전역 인스턴스는 없으며 호출자가 `create`로 만들어 필요한 곳에 주입합니다.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::info;

use live_core::{AppConfig, IntersectionId, IntersectionRef, LiveEvent, ViewBounds};
use live_transport::{ConnectionFactory, ReconnectPolicy};

use crate::aggregator::Aggregator;
use crate::consumers::{ConsumerHub, ObserverId, SharedSnapshot};
use crate::error::{StreamError, StreamResult};
use crate::publisher::BatchPublisher;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::registry::StreamRegistry;

/// 실시간 교차로 스트림 관리자.
pub struct LiveIntersectionManager {
    directory: RwLock<Vec<IntersectionRef>>,
    hub: Arc<ConsumerHub>,
    aggregator: Arc<Aggregator>,
    registry: Arc<StreamRegistry>,
    reconciler: Reconciler,
    publisher: BatchPublisher,
    shut_down: AtomicBool,
}

impl LiveIntersectionManager {
    /// 관리자 생성. `publisher.autostart`가 켜져 있으면 게시자도 시작합니다.
    pub async fn create(config: &AppConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        let hub = Arc::new(ConsumerHub::new(
            config.channels.event_capacity,
            config.channels.snapshot_capacity,
        ));
        let aggregator = Arc::new(Aggregator::new(hub.clone()));
        let registry = Arc::new(StreamRegistry::new(
            factory,
            aggregator.clone(),
            ReconnectPolicy::from_config(&config.reconnect),
        ));
        let publisher = BatchPublisher::new(aggregator.clone(), config.publisher.period());

        let manager = Self {
            directory: RwLock::new(Vec::new()),
            hub,
            aggregator,
            registry: registry.clone(),
            reconciler: Reconciler::new(registry),
            publisher,
            shut_down: AtomicBool::new(false),
        };

        if config.publisher.autostart {
            manager.publisher.start().await;
        }
        info!(
            publisher_period_ms = config.publisher.period_ms,
            autostart = config.publisher.autostart,
            "Live intersection manager created"
        );
        manager
    }

    fn ensure_running(&self) -> StreamResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(StreamError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// 교차로 디렉토리 교체. 다음 조정 단계부터 반영됩니다.
    pub async fn update_directory(&self, directory: Vec<IntersectionRef>) {
        let count = directory.len();
        *self.directory.write().await = directory;
        info!(count, "Intersection directory updated");
    }

    /// 현재 디렉토리.
    pub async fn directory(&self) -> Vec<IntersectionRef> {
        self.directory.read().await.clone()
    }

    /// 뷰포트 변경. 뷰포트 안의 교차로만 활성화합니다.
    pub async fn view_bounds_changed(&self, bounds: ViewBounds) -> StreamResult<ReconcileReport> {
        self.reconcile_with(|intersection| intersection.is_within(&bounds))
            .await
    }

    /// 관심 조건으로 디렉토리 전체를 한 번 걸러 조정.
    pub async fn reconcile_with<F>(&self, interest: F) -> StreamResult<ReconcileReport>
    where
        F: Fn(&IntersectionRef) -> bool,
    {
        self.ensure_running()?;
        let desired: Vec<IntersectionRef> = self
            .directory
            .read()
            .await
            .iter()
            .filter(|intersection| interest(*intersection))
            .cloned()
            .collect();
        Ok(self.reconciler.reconcile(&desired).await)
    }

    /// 교차로 ID 목록으로 조정. 디렉토리에 없는 ID는 실패로 보고됩니다.
    pub async fn set_interest(&self, ids: &[IntersectionId]) -> StreamResult<ReconcileReport> {
        self.ensure_running()?;

        let mut desired = Vec::with_capacity(ids.len());
        let mut unknown = Vec::new();
        {
            let directory = self.directory.read().await;
            for id in ids {
                match directory.iter().find(|i| i.intersection_id == *id) {
                    Some(intersection) => desired.push(intersection.clone()),
                    None => unknown.push(StreamError::UnknownIntersection(*id)),
                }
            }
        }

        let mut report = self.reconciler.reconcile(&desired).await;
        report.failures.extend(unknown);
        Ok(report)
    }

    /// 현재 활성 교차로 집합.
    pub async fn active_intersections(&self) -> BTreeSet<IntersectionId> {
        self.reconciler.active().await
    }

    /// 원시 이벤트 수신기.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<LiveEvent>> {
        self.hub.subscribe_events()
    }

    /// 스냅샷 수신기.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<SharedSnapshot> {
        self.hub.subscribe_snapshots()
    }

    /// 원시 이벤트 콜백 등록.
    pub fn register_event_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        self.hub.register_event_observer(observer)
    }

    /// 스냅샷 콜백 등록.
    pub fn register_snapshot_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&SharedSnapshot) + Send + Sync + 'static,
    {
        self.hub.register_snapshot_observer(observer)
    }

    /// 콜백 해제.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.hub.unregister(id)
    }

    /// 현재 최신 상태 (복사본).
    pub async fn snapshot(&self) -> SharedSnapshot {
        self.aggregator.snapshot().await
    }

    /// 게시자 시작 (활성 상태면 재시작).
    pub async fn start_publisher(&self) -> StreamResult<()> {
        self.ensure_running()?;
        self.publisher.start().await;
        Ok(())
    }

    /// 게시자 중지.
    pub async fn stop_publisher(&self) -> bool {
        self.publisher.stop().await
    }

    pub async fn is_publishing(&self) -> bool {
        self.publisher.is_active().await
    }

    /// 스트림 레지스트리.
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// 관리자 종료. 게시자를 멈추고 모든 구독을 닫습니다. 두 번째 호출은 아무것도 하지 않습니다.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.publisher.stop().await;
        let report = self.reconciler.reconcile(&[]).await;
        let remaining = self.registry.close_all().await;
        info!(
            closed = report.closed + remaining,
            "Live intersection manager shut down"
        );
    }
}
