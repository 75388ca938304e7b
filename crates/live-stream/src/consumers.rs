//! 소비자 등록 및 전달.
//!
//! 원시 이벤트와 주기 스냅샷을 두 가지 방식으로 내보냅니다:
//! - `broadcast` 채널: 용량이 차면 느린 수신자에게서 가장 오래된 항목이 밀려남
//!   (`RecvError::Lagged`). 수신자를 drop하면 등록이 해제됩니다.
//! - 콜백 observer: `ObserverId`로 등록/해제. 콜백은 짧게 끝나야 합니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::trace;

use live_core::LiveEvent;

use crate::aggregator::LatestStateSnapshot;

/// 공유 스냅샷.
pub type SharedSnapshot = Arc<LatestStateSnapshot>;

type EventObserver = Arc<dyn Fn(&LiveEvent) + Send + Sync>;
type SnapshotObserver = Arc<dyn Fn(&SharedSnapshot) + Send + Sync>;

/// 콜백 observer 식별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// 이벤트/스냅샷 소비자 허브.
pub struct ConsumerHub {
    events_tx: broadcast::Sender<Arc<LiveEvent>>,
    snapshots_tx: broadcast::Sender<SharedSnapshot>,
    next_id: AtomicU64,
    event_observers: RwLock<Vec<(ObserverId, EventObserver)>>,
    snapshot_observers: RwLock<Vec<(ObserverId, SnapshotObserver)>>,
}

impl ConsumerHub {
    /// 새 허브 생성.
    ///
    /// # Arguments
    ///
    /// * `event_capacity` - 원시 이벤트 채널 버퍼 크기
    /// * `snapshot_capacity` - 스냅샷 채널 버퍼 크기
    pub fn new(event_capacity: usize, snapshot_capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(event_capacity.max(1));
        let (snapshots_tx, _) = broadcast::channel(snapshot_capacity.max(1));
        Self {
            events_tx,
            snapshots_tx,
            next_id: AtomicU64::new(1),
            event_observers: RwLock::new(Vec::new()),
            snapshot_observers: RwLock::new(Vec::new()),
        }
    }

    /// 원시 이벤트 수신기.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<LiveEvent>> {
        self.events_tx.subscribe()
    }

    /// 스냅샷 수신기.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<SharedSnapshot> {
        self.snapshots_tx.subscribe()
    }

    /// 원시 이벤트 콜백 등록.
    pub fn register_event_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.event_observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// 스냅샷 콜백 등록.
    pub fn register_snapshot_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&SharedSnapshot) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.snapshot_observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// 콜백 해제. 다른 observer에는 영향이 없습니다.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut removed = false;
        {
            let mut observers = self
                .event_observers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let before = observers.len();
            observers.retain(|(observer_id, _)| *observer_id != id);
            removed |= observers.len() != before;
        }
        {
            let mut observers = self
                .snapshot_observers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let before = observers.len();
            observers.retain(|(observer_id, _)| *observer_id != id);
            removed |= observers.len() != before;
        }
        removed
    }

    /// 등록된 콜백 수.
    pub fn observer_count(&self) -> usize {
        self.event_observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            + self
                .snapshot_observers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
    }

    /// 원시 이벤트 전달.
    pub fn publish_event(&self, event: Arc<LiveEvent>) {
        // 콜백은 잠금 밖에서 호출 (콜백 안에서 해제 가능)
        let observers: Vec<EventObserver> = self
            .event_observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(&event);
        }

        if self.events_tx.send(event).is_err() {
            trace!("No event receivers");
        }
    }

    /// 스냅샷 전달. 채널 수신자 수를 반환합니다.
    pub fn publish_snapshot(&self, snapshot: SharedSnapshot) -> usize {
        let observers: Vec<SnapshotObserver> = self
            .snapshot_observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(&snapshot);
        }

        self.snapshots_tx.send(snapshot).unwrap_or(0)
    }

    fn allocate_id(&self) -> ObserverId {
        ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConsumerHub {
    fn default() -> Self {
        Self::new(1024, 16) // 기본 버퍼 크기
    }
}
