//! 교차로 참조 데이터.

use serde::{Deserialize, Serialize};

use crate::types::{IntersectionId, MessageKind, RoadRegulatorId, Topic, ViewBounds};

/// 구독 가능한 교차로에 대한 불변 참조 데이터.
///
/// 외부 디렉토리(REST)에서 공급되며 스트림 관리자는 수정하지 않습니다.
/// 직렬화 필드 이름은 대시보드 API와 동일합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionRef {
    /// 교차로 ID
    #[serde(rename = "intersectionID", alias = "intersectionId")]
    pub intersection_id: IntersectionId,
    /// 도로 관리 기관 ID
    #[serde(rename = "roadRegulatorID", alias = "roadRegulatorId", default)]
    pub road_regulator_id: RoadRegulatorId,
    /// RSU IP 주소
    #[serde(rename = "rsuIP", alias = "ip")]
    pub ip: String,
    /// 경도
    pub longitude: f64,
    /// 위도
    pub latitude: f64,
    /// 교차로 이름
    #[serde(rename = "intersectionName", alias = "name", default)]
    pub name: Option<String>,
}

impl IntersectionRef {
    /// 새 참조 데이터 생성.
    pub fn new(
        intersection_id: impl Into<IntersectionId>,
        road_regulator_id: RoadRegulatorId,
        ip: impl Into<String>,
        longitude: f64,
        latitude: f64,
    ) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            road_regulator_id,
            ip: ip.into(),
            longitude,
            latitude,
            name: None,
        }
    }

    /// 이름 설정.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 이 교차로의 종류별 토픽.
    pub fn topic(&self, stream_root: &str, kind: MessageKind) -> Topic {
        Topic::new(
            stream_root,
            self.road_regulator_id,
            self.intersection_id,
            kind,
        )
    }

    /// 뷰포트 안에 있는지 확인.
    pub fn is_within(&self, bounds: &ViewBounds) -> bool {
        bounds.contains(self.longitude, self.latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_dashboard_shape() {
        let json = r#"{
            "intersectionID": 8801,
            "roadRegulatorID": -1,
            "rsuIP": "10.11.81.29",
            "longitude": -104.8863731,
            "latitude": 39.5946919,
            "intersectionName": null
        }"#;

        let intersection: IntersectionRef = serde_json::from_str(json).unwrap();
        assert_eq!(intersection.intersection_id, IntersectionId(8801));
        assert_eq!(intersection.road_regulator_id, RoadRegulatorId::UNSPECIFIED);
        assert_eq!(intersection.ip, "10.11.81.29");
        assert!(intersection.name.is_none());
    }

    #[test]
    fn test_topic_for_kind() {
        let intersection =
            IntersectionRef::new(8802, RoadRegulatorId(-1), "10.11.81.30", -104.88, 39.59);
        assert_eq!(
            intersection.topic("live", MessageKind::Map).to_string(),
            "/live/-1/8802/map"
        );
    }
}
