//! 종류별 스트림 레지스트리.
//!
//! (교차로, 종류) 키마다 정확히 하나의 관리 구독을 보관합니다. 관리 구독은
//! 감시 태스크(클라이언트와 토픽 채널을 소유), 취소 토큰, 상태 채널로 구성됩니다.
//!
//! 연결은 항목 잠금 밖에서 이루어집니다. 연결 중인 키는 별도로 예약해 두므로
//! 느린 RSU가 조회(`len`, `status`)나 다른 키의 열기를 막지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use live_core::{IntersectionRef, MessageKind, SubscriptionKey, Topic};
use live_transport::{ConnectionFactory, ReconnectPolicy};

use crate::aggregator::Aggregator;
use crate::error::StreamResult;
use crate::supervisor::{SubscriptionStatus, Supervisor};

/// 레지스트리가 소유하는 관리 구독.
struct ManagedSubscription {
    topic: Topic,
    cancel: CancellationToken,
    status: watch::Receiver<SubscriptionStatus>,
    task: Option<JoinHandle<()>>,
    opened_at: DateTime<Utc>,
}

impl ManagedSubscription {
    fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ManagedSubscription {
    fn drop(&mut self) {
        // 취소는 멱등
        self.cancel.cancel();
    }
}

/// 구독 정보 (관찰용).
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub key: SubscriptionKey,
    pub topic: Topic,
    pub status: SubscriptionStatus,
    pub opened_at: DateTime<Utc>,
}

/// 연결 중인 키 예약. drop 시 해제되므로 열기 future가 취소되어도 남지 않습니다.
struct Reservation<'a> {
    opening: &'a StdMutex<HashSet<SubscriptionKey>>,
    key: SubscriptionKey,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        lock_opening(self.opening).remove(&self.key);
    }
}

fn lock_opening(
    opening: &StdMutex<HashSet<SubscriptionKey>>,
) -> MutexGuard<'_, HashSet<SubscriptionKey>> {
    opening.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 스트림 레지스트리.
pub struct StreamRegistry {
    entries: Mutex<HashMap<SubscriptionKey, ManagedSubscription>>,
    opening: StdMutex<HashSet<SubscriptionKey>>,
    factory: Arc<dyn ConnectionFactory>,
    aggregator: Arc<Aggregator>,
    policy: ReconnectPolicy,
}

impl StreamRegistry {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        aggregator: Arc<Aggregator>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            opening: StdMutex::new(HashSet::new()),
            factory,
            aggregator,
            policy,
        }
    }

    /// 구독 열기.
    ///
    /// 이미 있거나 연결 중인 키면 아무것도 하지 않고 `false`를 반환합니다.
    /// 연결/구독이 실패하면 항목을 남기지 않고 에러를 반환합니다. 같은 키를
    /// 동시에 여는 경우에도 연결은 한 번만 일어납니다.
    pub async fn open(&self, intersection: &IntersectionRef, kind: MessageKind) -> StreamResult<bool> {
        let key = SubscriptionKey::new(intersection.intersection_id, kind);
        let _reservation = {
            let entries = self.entries.lock().await;
            match self.reserve(key, &entries) {
                Some(reservation) => reservation,
                None => return Ok(false),
            }
        };

        let stream = self.factory.open(intersection, kind).await?;
        // 예약은 삽입 이후에 풀려야 중복 열기 사이에 틈이 없음
        let mut entries = self.entries.lock().await;

        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(SubscriptionStatus::Connecting);
        let topic = stream.topic.clone();
        let supervisor = Supervisor {
            key,
            intersection: intersection.clone(),
            factory: self.factory.clone(),
            aggregator: self.aggregator.clone(),
            policy: self.policy.clone(),
            cancel: cancel.clone(),
            status: status_tx,
        };
        let task = tokio::spawn(supervisor.run(stream));

        info!(key = %key, topic = %topic, "Subscription opened");
        entries.insert(
            key,
            ManagedSubscription {
                topic,
                cancel,
                status: status_rx,
                task: Some(task),
                opened_at: Utc::now(),
            },
        );
        Ok(true)
    }

    /// 항목 잠금을 쥔 상태에서 키 예약. 이미 열렸거나 연결 중이면 `None`.
    fn reserve(
        &self,
        key: SubscriptionKey,
        entries: &HashMap<SubscriptionKey, ManagedSubscription>,
    ) -> Option<Reservation<'_>> {
        if entries.contains_key(&key) {
            return None;
        }
        if !lock_opening(&self.opening).insert(key) {
            debug!(key = %key, "Open already in flight");
            return None;
        }
        Some(Reservation {
            opening: &self.opening,
            key,
        })
    }

    /// 구독 닫기. 없는 키는 조용히 무시하고 `false`를 반환합니다.
    ///
    /// 반환 시점 이후에는 이 키의 메시지가 저장소에 반영되지 않으며 기존 항목도
    /// 제거되어 있습니다.
    pub async fn close(&self, key: SubscriptionKey) -> bool {
        let removed = self.entries.lock().await.remove(&key);
        match removed {
            Some(subscription) => {
                subscription.cancel();
                self.aggregator.purge(key).await;
                debug!(key = %key, topic = %subscription.topic, "Subscription closed");
                true
            }
            None => false,
        }
    }

    /// 모든 구독을 닫고 감시 태스크 종료를 기다림.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(SubscriptionKey, ManagedSubscription)> =
            self.entries.lock().await.drain().collect();
        let count = drained.len();

        let mut tasks = Vec::with_capacity(count);
        for (key, mut subscription) in drained {
            subscription.cancel();
            self.aggregator.purge(key).await;
            tasks.extend(subscription.task.take());
        }
        join_all(tasks).await;

        if count > 0 {
            info!(count, "All subscriptions closed");
        }
        count
    }

    /// 열린 구독 수.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// 종류별 열린 구독 수.
    pub async fn len_by_kind(&self, kind: MessageKind) -> usize {
        self.entries
            .lock()
            .await
            .keys()
            .filter(|key| key.kind == kind)
            .count()
    }

    /// 키가 등록되어 있는지 확인.
    pub async fn contains(&self, key: SubscriptionKey) -> bool {
        self.entries.lock().await.contains_key(&key)
    }

    /// 등록된 키 목록 (정렬됨).
    pub async fn keys(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<SubscriptionKey> = self.entries.lock().await.keys().copied().collect();
        keys.sort();
        keys
    }

    /// 구독 상태.
    pub async fn status(&self, key: SubscriptionKey) -> Option<SubscriptionStatus> {
        self.entries
            .lock()
            .await
            .get(&key)
            .map(|subscription| *subscription.status.borrow())
    }

    /// 구독 정보 목록 (키 순).
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let entries = self.entries.lock().await;
        let mut infos: Vec<SubscriptionInfo> = entries
            .iter()
            .map(|(key, subscription)| SubscriptionInfo {
                key: *key,
                topic: subscription.topic.clone(),
                status: *subscription.status.borrow(),
                opened_at: subscription.opened_at,
            })
            .collect();
        infos.sort_by_key(|info| info.key);
        infos
    }
}
