//! 구독 조정기.
//!
//! 관심 교차로 집합과 활성 집합의 차이를 계산해 레지스트리에 열기/닫기를
//! 요청합니다. 같은 집합으로 두 번 조정하면 두 번째에는 아무 작업도 하지 않습니다.
//! 이전 단계에서 열기에 실패했거나 재연결을 소진한(`Failed`) 교차로는 여전히
//! 관심 대상이면 다시 엽니다.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use live_core::{IntersectionId, IntersectionRef, MessageKind, SubscriptionKey};

use crate::error::StreamError;
use crate::registry::StreamRegistry;

/// 조정 결과.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// 새로 활성화된 교차로
    pub added: Vec<IntersectionId>,
    /// 비활성화된 교차로
    pub removed: Vec<IntersectionId>,
    /// 다시 열기를 시도한 교차로
    pub retried: Vec<IntersectionId>,
    /// 레지스트리에서 새로 연 구독 수
    pub opened: usize,
    /// 레지스트리에서 닫은 구독 수
    pub closed: usize,
    /// 교차로 단위 실패
    pub failures: Vec<StreamError>,
}

impl ReconcileReport {
    /// 레지스트리 작업이 없었는지 확인.
    pub fn is_noop(&self) -> bool {
        self.opened == 0 && self.closed == 0
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// 실패한 교차로 ID.
    pub fn failed_intersections(&self) -> Vec<IntersectionId> {
        self.failures
            .iter()
            .filter_map(StreamError::intersection_id)
            .collect()
    }
}

/// 구독 조정기.
pub struct Reconciler {
    registry: Arc<StreamRegistry>,
    active: Mutex<BTreeSet<IntersectionId>>,
}

impl Reconciler {
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self {
            registry,
            active: Mutex::new(BTreeSet::new()),
        }
    }

    /// 현재 활성 교차로 집합.
    pub async fn active(&self) -> BTreeSet<IntersectionId> {
        self.active.lock().await.clone()
    }

    /// 관심 교차로 목록으로 조정.
    ///
    /// 조정 단계는 직렬화됩니다. 활성 집합은 `desired`로 통째로 교체되며,
    /// 열기에 실패한 교차로도 포함되어 다음 단계에서 재시도됩니다.
    pub async fn reconcile(&self, desired: &[IntersectionRef]) -> ReconcileReport {
        let mut active = self.active.lock().await;
        let mut report = ReconcileReport::default();

        let wanted: BTreeSet<IntersectionId> =
            desired.iter().map(|i| i.intersection_id).collect();

        // 제거
        for id in active.difference(&wanted) {
            for key in SubscriptionKey::all_for(*id) {
                if self.registry.close(key).await {
                    report.closed += 1;
                }
            }
            debug!(intersection_id = %id, "Removed subscriptions for intersection");
            report.removed.push(*id);
        }

        // 추가 + 재시도
        let mut seen = BTreeSet::new();
        for intersection in desired {
            let id = intersection.intersection_id;
            if !seen.insert(id) {
                continue;
            }

            if active.contains(&id) {
                if !self.needs_retry(id, &mut report).await {
                    continue;
                }
                report.retried.push(id);
            } else {
                report.added.push(id);
            }

            if let Err(e) = self.open_all(intersection, &mut report).await {
                warn!(intersection_id = %id, error = %e, "Failed to open intersection");
                report.failures.push(e);
            }
        }

        *active = wanted;

        if !report.is_noop() || report.has_failures() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                retried = report.retried.len(),
                opened = report.opened,
                closed = report.closed,
                failures = report.failures.len(),
                active = active.len(),
                "Reconciled intersection subscriptions"
            );
        }
        report
    }

    /// 종류 하나라도 빠졌거나 `Failed`이면 재시도 대상. `Failed` 구독은 여기서 닫습니다.
    async fn needs_retry(&self, id: IntersectionId, report: &mut ReconcileReport) -> bool {
        let mut retry = false;
        for key in SubscriptionKey::all_for(id) {
            match self.registry.status(key).await {
                None => retry = true,
                Some(status) if status.is_failed() => {
                    if self.registry.close(key).await {
                        report.closed += 1;
                    }
                    retry = true;
                }
                Some(_) => {}
            }
        }
        retry
    }

    /// 교차로의 MAP/SPAT/BSM 구독을 동시에 열기.
    ///
    /// 하나라도 실패하면 이 교차로의 구독을 모두 닫고 첫 번째 에러를 반환합니다.
    async fn open_all(
        &self,
        intersection: &IntersectionRef,
        report: &mut ReconcileReport,
    ) -> Result<(), StreamError> {
        let id = intersection.intersection_id;

        let results = join_all(
            MessageKind::ALL
                .iter()
                .map(|kind| self.registry.open(intersection, *kind)),
        )
        .await;

        let mut first_error = None;
        for result in results {
            match result {
                Ok(true) => report.opened += 1,
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let Some(e) = first_error else {
            return Ok(());
        };

        for key in SubscriptionKey::all_for(id) {
            if self.registry.close(key).await {
                report.closed += 1;
            }
        }
        Err(match e {
            StreamError::Transport(source) => StreamError::Reconcile {
                intersection_id: id,
                source,
            },
            other => other,
        })
    }
}
