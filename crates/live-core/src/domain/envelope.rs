//! 수신 메시지 envelope.
//!
//! Connection Client가 전달한 원본 문자열을 종류별 페이로드로 디코딩하고
//! 수신 시각을 붙입니다. envelope는 생성 후 변경되지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BsmFeature, ProcessedMap, ProcessedSpat};
use crate::types::{IntersectionId, MessageKind, SubscriptionKey, VehicleId};
use crate::{CoreError, CoreResult};

/// 종류별 페이로드를 감싸는 불변 envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEnvelope<T> {
    pub kind: MessageKind,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> LiveEnvelope<T> {
    /// 수신 시각으로 envelope 생성. `updated_at`은 수신 시각과 같습니다.
    pub fn new(kind: MessageKind, payload: T, received_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            received_at,
            updated_at: received_at,
            payload,
        }
    }
}

/// 교차로 ID로 태깅된 실시간 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LiveEvent {
    Map {
        intersection_id: IntersectionId,
        envelope: LiveEnvelope<ProcessedMap>,
    },
    Spat {
        intersection_id: IntersectionId,
        envelope: LiveEnvelope<ProcessedSpat>,
    },
    Bsm {
        intersection_id: IntersectionId,
        envelope: LiveEnvelope<BsmFeature>,
    },
}

impl LiveEvent {
    /// 구독 키에 맞춰 원본 JSON을 디코딩.
    ///
    /// 교차로 ID는 페이로드가 아니라 구독 키에서 가져옵니다. 페이로드의 ID가
    /// 다르더라도 이벤트는 해당 구독에 속합니다.
    pub fn decode(
        key: SubscriptionKey,
        body: &str,
        received_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let intersection_id = key.intersection_id;
        let kind = key.kind;

        let event = match kind {
            MessageKind::Map => LiveEvent::Map {
                intersection_id,
                envelope: LiveEnvelope::new(kind, parse(kind, body)?, received_at),
            },
            MessageKind::Spat => LiveEvent::Spat {
                intersection_id,
                envelope: LiveEnvelope::new(kind, parse(kind, body)?, received_at),
            },
            MessageKind::Bsm => LiveEvent::Bsm {
                intersection_id,
                envelope: LiveEnvelope::new(kind, parse(kind, body)?, received_at),
            },
        };

        Ok(event)
    }

    /// 메시지 종류.
    pub fn kind(&self) -> MessageKind {
        match self {
            LiveEvent::Map { .. } => MessageKind::Map,
            LiveEvent::Spat { .. } => MessageKind::Spat,
            LiveEvent::Bsm { .. } => MessageKind::Bsm,
        }
    }

    /// 교차로 ID.
    pub fn intersection_id(&self) -> IntersectionId {
        match self {
            LiveEvent::Map {
                intersection_id, ..
            }
            | LiveEvent::Spat {
                intersection_id, ..
            }
            | LiveEvent::Bsm {
                intersection_id, ..
            } => *intersection_id,
        }
    }

    /// 이 이벤트가 속한 구독 키.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.intersection_id(), self.kind())
    }

    /// 수신 시각.
    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            LiveEvent::Map { envelope, .. } => envelope.received_at,
            LiveEvent::Spat { envelope, .. } => envelope.received_at,
            LiveEvent::Bsm { envelope, .. } => envelope.received_at,
        }
    }

    /// BSM이면 차량 ID.
    pub fn vehicle_id(&self) -> Option<&VehicleId> {
        match self {
            LiveEvent::Bsm { envelope, .. } => Some(envelope.payload.vehicle_id()),
            _ => None,
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(kind: MessageKind, body: &str) -> CoreResult<T> {
    serde_json::from_str(body).map_err(|e| CoreError::decode(kind, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BSM: &str = r#"{
        "type": "Feature",
        "properties": {
            "id": "v1",
            "position": { "latitude": 39.5946919, "longitude": -104.8863731 },
            "speed": 8.0,
            "heading": 270
        },
        "geometry": { "type": "Point", "coordinates": [-104.8863731, 39.5946919] }
    }"#;

    #[test]
    fn test_decode_bsm_tags_intersection_from_key() {
        let key = SubscriptionKey::new(IntersectionId(8801), MessageKind::Bsm);
        let now = Utc::now();

        let event = LiveEvent::decode(key, BSM, now).unwrap();
        assert_eq!(event.kind(), MessageKind::Bsm);
        assert_eq!(event.intersection_id(), IntersectionId(8801));
        assert_eq!(event.key(), key);
        assert_eq!(event.received_at(), now);
        assert_eq!(event.vehicle_id().map(|v| v.as_str()), Some("v1"));

        if let LiveEvent::Bsm { envelope, .. } = event {
            assert_eq!(envelope.received_at, envelope.updated_at);
        }
    }

    #[test]
    fn test_decode_error_names_kind() {
        let key = SubscriptionKey::new(IntersectionId(8801), MessageKind::Spat);

        let err = LiveEvent::decode(key, "{not json", Utc::now()).unwrap_err();
        assert!(err.is_message_local());
        assert!(err.to_string().starts_with("Failed to decode spat payload"));

        // BSM 스키마는 SPAT 구독에서 거부됨
        assert!(LiveEvent::decode(key, BSM, Utc::now()).is_err());
    }
}
