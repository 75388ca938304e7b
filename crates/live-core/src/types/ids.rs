//! 강타입 식별자와 메시지 종류.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// 교차로 식별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntersectionId(pub i32);

impl IntersectionId {
    /// 원시 값 반환.
    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for IntersectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for IntersectionId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// 도로 관리 기관 식별자. 대시보드는 미지정 시 -1을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadRegulatorId(pub i32);

impl RoadRegulatorId {
    /// 미지정 관리 기관.
    pub const UNSPECIFIED: RoadRegulatorId = RoadRegulatorId(-1);
}

impl Default for RoadRegulatorId {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl fmt::Display for RoadRegulatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 차량 식별자 (BSM `properties.id`).
///
/// 교차로 내에서만 유일하다고 가정하므로 항상 교차로 ID와 함께 키로 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    /// 새 차량 식별자 생성.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 문자열 참조 반환.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 실시간 메시지 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// 차로 기하 구조
    Map,
    /// 신호 현시/타이밍
    Spat,
    /// 차량 기본 안전 메시지
    Bsm,
}

impl MessageKind {
    /// 모든 종류 (구독 개설 순서).
    pub const ALL: [MessageKind; 3] = [MessageKind::Map, MessageKind::Spat, MessageKind::Bsm];

    /// 토픽 접미사.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Map => "map",
            MessageKind::Spat => "spat",
            MessageKind::Bsm => "bsm",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "map" => Ok(MessageKind::Map),
            "spat" => Ok(MessageKind::Spat),
            "bsm" => Ok(MessageKind::Bsm),
            other => Err(CoreError::InvalidTopic(format!(
                "unknown message kind: {}",
                other
            ))),
        }
    }
}

/// 레지스트리의 구독 키: 교차로 x 메시지 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub intersection_id: IntersectionId,
    pub kind: MessageKind,
}

impl SubscriptionKey {
    /// 새 구독 키 생성.
    pub fn new(intersection_id: IntersectionId, kind: MessageKind) -> Self {
        Self {
            intersection_id,
            kind,
        }
    }

    /// 교차로의 모든 종류에 대한 키.
    pub fn all_for(intersection_id: IntersectionId) -> [SubscriptionKey; 3] {
        MessageKind::ALL.map(|kind| SubscriptionKey::new(intersection_id, kind))
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.intersection_id, self.kind)
    }
}
