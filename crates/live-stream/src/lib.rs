//! # Live Stream
//!
//! 교차로별 MAP / SPAT / BSM 실시간 구독을 관리합니다.
//!
//! - [`StreamRegistry`]: (교차로, 종류)마다 하나의 구독을 보관
//! - [`Reconciler`]: 관심 교차로 집합 변경을 구독 열기/닫기로 변환
//! - [`Aggregator`]: 종류별/차량별 최신 상태 저장소
//! - [`BatchPublisher`]: 주기적으로 불변 스냅샷을 게시
//! - [`ConsumerHub`]: 원시 이벤트와 스냅샷을 소비자에게 전달
//! - [`LiveIntersectionManager`]: 위 구성 요소를 묶는 진입점
//!
//! ```text
//! 뷰포트 변경 → Reconciler → StreamRegistry → 구독 감시 태스크
//!                                                 ↓
//!                  소비자 ← BatchPublisher ← Aggregator → 소비자 (원시 이벤트)
//! ```

pub mod aggregator;
pub mod consumers;
pub mod error;
pub mod manager;
pub mod publisher;
pub mod reconciler;
pub mod registry;
mod supervisor;

pub use aggregator::{Aggregator, LatestStateSnapshot};
pub use consumers::{ConsumerHub, ObserverId, SharedSnapshot};
pub use error::{StreamError, StreamResult};
pub use manager::LiveIntersectionManager;
pub use publisher::BatchPublisher;
pub use reconciler::{ReconcileReport, Reconciler};
pub use registry::{StreamRegistry, SubscriptionInfo};
pub use supervisor::SubscriptionStatus;
