//! 최신 상태 저장소.
//!
//! 교차로/종류별 마지막 메시지를 보관합니다. BSM은 교차로 아래에 차량 ID로
//! 중첩됩니다. 타임스탬프 비교 없이 나중에 도착한 메시지가 항상 이깁니다.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use live_core::{
    BsmFeature, IntersectionId, LiveEnvelope, LiveEvent, MessageKind, ProcessedMap,
    ProcessedSpat, SubscriptionKey, VehicleId,
};

use crate::consumers::{ConsumerHub, SharedSnapshot};

/// 최신 상태. 게시되는 스냅샷은 이 구조체의 복사본입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatestStateSnapshot {
    pub maps: HashMap<IntersectionId, LiveEnvelope<ProcessedMap>>,
    pub spats: HashMap<IntersectionId, LiveEnvelope<ProcessedSpat>>,
    pub bsms: HashMap<IntersectionId, HashMap<VehicleId, LiveEnvelope<BsmFeature>>>,
}

impl LatestStateSnapshot {
    /// 이벤트 하나를 반영 (last-write-wins).
    pub fn apply(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Map {
                intersection_id,
                envelope,
            } => {
                self.maps.insert(intersection_id, envelope);
            }
            LiveEvent::Spat {
                intersection_id,
                envelope,
            } => {
                self.spats.insert(intersection_id, envelope);
            }
            LiveEvent::Bsm {
                intersection_id,
                envelope,
            } => {
                let vehicle_id = envelope.payload.vehicle_id().clone();
                self.bsms
                    .entry(intersection_id)
                    .or_default()
                    .insert(vehicle_id, envelope);
            }
        }
    }

    /// 구독 키에 해당하는 항목 제거.
    pub fn purge(&mut self, key: SubscriptionKey) {
        match key.kind {
            MessageKind::Map => {
                self.maps.remove(&key.intersection_id);
            }
            MessageKind::Spat => {
                self.spats.remove(&key.intersection_id);
            }
            MessageKind::Bsm => {
                self.bsms.remove(&key.intersection_id);
            }
        }
    }

    /// 교차로에 대한 항목이 하나라도 있는지 확인.
    pub fn contains_intersection(&self, id: IntersectionId) -> bool {
        self.maps.contains_key(&id) || self.spats.contains_key(&id) || self.bsms.contains_key(&id)
    }

    /// 차량의 최신 BSM.
    pub fn bsm(&self, id: IntersectionId, vehicle: &VehicleId) -> Option<&LiveEnvelope<BsmFeature>> {
        self.bsms.get(&id).and_then(|vehicles| vehicles.get(vehicle))
    }

    /// 전체 차량 수.
    pub fn vehicle_count(&self) -> usize {
        self.bsms.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty() && self.spats.is_empty() && self.bsms.is_empty()
    }
}

/// 최신 상태 저장소.
///
/// 수집(구독 태스크)과 게시(배치 게시자)가 공유하는 유일한 상태입니다.
pub struct Aggregator {
    state: RwLock<LatestStateSnapshot>,
    hub: Arc<ConsumerHub>,
}

impl Aggregator {
    pub fn new(hub: Arc<ConsumerHub>) -> Self {
        Self {
            state: RwLock::new(LatestStateSnapshot::default()),
            hub,
        }
    }

    /// 구독 태스크에서 받은 이벤트를 반영하고 원시 이벤트 소비자에게 전달.
    ///
    /// 토큰은 쓰기 잠금을 잡은 뒤 확인합니다. `close()`는 토큰을 먼저 취소한 뒤
    /// 같은 잠금 아래에서 항목을 지우므로, 취소 이후의 메시지는 반영되지 않습니다.
    /// 반영되었으면 `true`.
    pub async fn fold(&self, event: LiveEvent, token: &CancellationToken) -> bool {
        let mut state = self.state.write().await;
        if token.is_cancelled() {
            trace!(key = %event.key(), "Dropping message after cancellation");
            return false;
        }

        let shared = Arc::new(event);
        state.apply(LiveEvent::clone(&shared));
        self.hub.publish_event(shared);
        true
    }

    /// 구독 키의 항목 제거.
    pub async fn purge(&self, key: SubscriptionKey) {
        self.state.write().await.purge(key);
    }

    /// 현재 상태의 깊은 복사본.
    pub async fn snapshot(&self) -> SharedSnapshot {
        Arc::new(self.state.read().await.clone())
    }

    /// 스냅샷을 만들어 모든 소비자에게 게시.
    pub async fn publish_snapshot(&self) -> SharedSnapshot {
        let snapshot = self.snapshot().await;
        self.hub.publish_snapshot(snapshot.clone());
        snapshot
    }
}
