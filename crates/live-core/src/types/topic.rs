//! 실시간 토픽 이름.
//!
//! 형식: `/{stream_root}/{roadRegulatorId}/{intersectionId}/{map|spat|bsm}`

use std::fmt;

use crate::types::{IntersectionId, MessageKind, RoadRegulatorId, SubscriptionKey};
use crate::{CoreError, CoreResult};

/// 하나의 교차로/종류에 대한 구독 토픽.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub stream_root: String,
    pub road_regulator_id: RoadRegulatorId,
    pub intersection_id: IntersectionId,
    pub kind: MessageKind,
}

impl Topic {
    /// 새 토픽 생성.
    pub fn new(
        stream_root: impl Into<String>,
        road_regulator_id: RoadRegulatorId,
        intersection_id: IntersectionId,
        kind: MessageKind,
    ) -> Self {
        Self {
            stream_root: stream_root.into(),
            road_regulator_id,
            intersection_id,
            kind,
        }
    }

    /// 토픽 문자열 파싱.
    pub fn parse(destination: &str) -> CoreResult<Self> {
        let parts: Vec<&str> = destination
            .strip_prefix('/')
            .ok_or_else(|| CoreError::InvalidTopic(destination.to_string()))?
            .split('/')
            .collect();

        if parts.len() != 4 || parts[0].is_empty() {
            return Err(CoreError::InvalidTopic(destination.to_string()));
        }

        let road_regulator_id = parts[1]
            .parse::<i32>()
            .map_err(|_| CoreError::InvalidTopic(destination.to_string()))?;
        let intersection_id = parts[2]
            .parse::<i32>()
            .map_err(|_| CoreError::InvalidTopic(destination.to_string()))?;
        let kind = parts[3].parse::<MessageKind>()?;

        Ok(Self {
            stream_root: parts[0].to_string(),
            road_regulator_id: RoadRegulatorId(road_regulator_id),
            intersection_id: IntersectionId(intersection_id),
            kind,
        })
    }

    /// 이 토픽에 대응하는 레지스트리 키.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.intersection_id, self.kind)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}",
            self.stream_root, self.road_regulator_id, self.intersection_id, self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_format() {
        let topic = Topic::new(
            "live",
            RoadRegulatorId(-1),
            IntersectionId(8801),
            MessageKind::Spat,
        );
        assert_eq!(topic.to_string(), "/live/-1/8801/spat");
    }

    #[test]
    fn test_topic_parse() {
        let topic = Topic::parse("/live/104/12109/bsm").unwrap();
        assert_eq!(topic.stream_root, "live");
        assert_eq!(topic.road_regulator_id, RoadRegulatorId(104));
        assert_eq!(topic.intersection_id, IntersectionId(12109));
        assert_eq!(topic.kind, MessageKind::Bsm);
        assert_eq!(
            topic.key(),
            SubscriptionKey::new(IntersectionId(12109), MessageKind::Bsm)
        );
    }

    #[test]
    fn test_topic_parse_rejects_malformed() {
        assert!(Topic::parse("live/1/2/map").is_err());
        assert!(Topic::parse("/live/1/2").is_err());
        assert!(Topic::parse("/live/x/2/map").is_err());
        assert!(Topic::parse("/live/1/2/tim").is_err());
        assert!(Topic::parse("//1/2/map").is_err());
    }
}
