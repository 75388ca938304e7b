//! 메시지 종류별 페이로드 스키마 (UTF-8 JSON).
//!
//! 지도 렌더링에 필요한 필드만 강타입으로 두고, 나머지 필드는 `extra`에 그대로
//! 보존하여 재직렬화 시 손실이 없게 합니다.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::{IntersectionId, RoadRegulatorId, VehicleId};

fn feature_collection() -> String {
    "FeatureCollection".to_string()
}

fn feature() -> String {
    "Feature".to_string()
}

fn point() -> String {
    "Point".to_string()
}

/// 기준점 (MAP refPoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
}

// ============================================================================
// MAP
// ============================================================================

/// 처리된 MAP 메시지 (차로 기하 구조 FeatureCollection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMap {
    #[serde(rename = "type", default = "feature_collection")]
    pub collection_type: String,
    pub properties: MapProperties,
    /// 차로 feature (GeoJSON, 해석하지 않음)
    #[serde(default)]
    pub features: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// MAP 공통 속성.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapProperties {
    pub intersection_id: IntersectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_regulator_id: Option<RoadRegulatorId>,
    pub ref_point: RefPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ode_received_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessedMap {
    /// 기준점과 차로 feature로 MAP 생성.
    pub fn new(intersection_id: IntersectionId, ref_point: RefPoint, features: Vec<Value>) -> Self {
        Self {
            collection_type: feature_collection(),
            properties: MapProperties {
                intersection_id,
                road_regulator_id: None,
                ref_point,
                time_stamp: None,
                ode_received_at: None,
                extra: Map::new(),
            },
            features,
            extra: Map::new(),
        }
    }

    /// 교차로 ID.
    pub fn intersection_id(&self) -> IntersectionId {
        self.properties.intersection_id
    }
}

// ============================================================================
// SPAT
// ============================================================================

/// 처리된 SPAT 메시지 (신호 현시/타이밍).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSpat {
    pub intersection_id: IntersectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_regulator_id: Option<RoadRegulatorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_time_stamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ode_received_at: Option<Value>,
    #[serde(default)]
    pub states: Vec<MovementState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 신호 그룹별 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementState {
    pub signal_group: i32,
    #[serde(default)]
    pub state_time_speed: Vec<MovementEvent>,
}

/// 신호 이벤트 (현시 + 타이밍).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementEvent {
    pub event_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Value>,
}

impl ProcessedSpat {
    /// 교차로 ID.
    pub fn intersection_id(&self) -> IntersectionId {
        self.intersection_id
    }

    /// 신호 그룹의 현재 현시.
    pub fn event_state(&self, signal_group: i32) -> Option<&str> {
        self.states
            .iter()
            .find(|state| state.signal_group == signal_group)
            .and_then(|state| state.state_time_speed.first())
            .map(|event| event.event_state.as_str())
    }
}

// ============================================================================
// BSM
// ============================================================================

/// BSM (GeoJSON Point feature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BsmFeature {
    #[serde(rename = "type", default = "feature")]
    pub feature_type: String,
    pub properties: BsmProperties,
    pub geometry: PointGeometry,
}

/// BSM 속성.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BsmProperties {
    /// 차량 ID (교차로 내에서 유일)
    pub id: VehicleId,
    #[serde(default)]
    pub msg_cnt: u32,
    #[serde(default)]
    pub sec_mark: u32,
    pub position: BsmPosition,
    /// 속도 (m/s)
    #[serde(default)]
    pub speed: f64,
    /// 진행 방향 (도)
    #[serde(default)]
    pub heading: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ode_received_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 차량 위치.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BsmPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
}

/// GeoJSON Point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type", default = "point")]
    pub geometry_type: String,
    /// `[경도, 위도]`
    pub coordinates: Vec<f64>,
}

impl BsmFeature {
    /// 위치/속도/방향으로 BSM 생성.
    ///
    /// 센서 정보가 없는 필드는 "unavailable" 값으로 채웁니다.
    pub fn new(
        id: VehicleId,
        longitude: f64,
        latitude: f64,
        speed: f64,
        heading: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let sec_mark = timestamp.second() * 1000 + timestamp.timestamp_subsec_millis() % 1000;

        let mut extra = Map::new();
        extra.insert(
            "accuracy".to_string(),
            json!({ "semiMajor": 2, "semiMinor": 2, "orientation": 0 }),
        );
        extra.insert("transmission".to_string(), json!("UNAVAILABLE"));
        extra.insert(
            "brakes".to_string(),
            json!({
                "wheelBrakes": { "unavailable": true },
                "traction": "unavailable",
                "abs": "off",
                "scs": "unavailable",
                "brakeBoost": "unavailable",
                "auxBrakes": "unavailable"
            }),
        );
        extra.insert("size".to_string(), json!({ "width": 180, "length": 480 }));

        Self {
            feature_type: feature(),
            properties: BsmProperties {
                id,
                msg_cnt: 0,
                sec_mark,
                position: BsmPosition {
                    latitude,
                    longitude,
                    elevation: 0.0,
                },
                speed,
                heading,
                ode_received_at: Some(timestamp.timestamp_millis()),
                extra,
            },
            geometry: PointGeometry {
                geometry_type: point(),
                coordinates: vec![longitude, latitude],
            },
        }
    }

    /// 차량 ID.
    pub fn vehicle_id(&self) -> &VehicleId {
        &self.properties.id
    }
}
