//! 합성 MAP/SPAT/BSM 생성기.
//!
//! 실제 전송과 같은 JSON 형태를 만들어 시뮬레이션 클라이언트가 토픽 채널로
//! 흘려보냅니다.
//!
//! - MAP: 기준점에서 동서남북으로 뻗은 진입 차로 4개
//! - SPAT: 신호 그룹 2/6과 4/8이 녹색 → 황색 → 적색 순으로 교대
//! - BSM: 교차로당 N대의 차량이 기준점 주변을 랜덤 워크

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use sha2::{Digest, Sha256};

use live_core::{
    BsmFeature, IntersectionRef, MessageKind, MovementEvent, MovementState, ProcessedMap,
    ProcessedSpat, RefPoint, VehicleId,
};

/// 차로 길이 (도).
const LANE_LENGTH_DEG: f64 = 0.0005;

/// 초기 차량 위치 분산 (도).
const INITIAL_SPREAD_DEG: f64 = 0.001;

/// 랜덤 워크 한 스텝 크기 (도).
const WALK_STEP_DEG: f64 = 0.0001;

/// 한 현시 단계가 유지되는 틱 수.
const STAGE_TICKS: u64 = 30;

const GREEN: &str = "PROTECTED_MOVEMENT_ALLOWED";
const YELLOW: &str = "PROTECTED_CLEARANCE";
const RED: &str = "STOP_AND_REMAIN";

/// 합성 차량 ID: `"{intersectionId}-{index}"`의 SHA-256 hex.
pub fn vehicle_id(intersection: &IntersectionRef, index: usize) -> VehicleId {
    let digest = Sha256::digest(format!("{}-{}", intersection.intersection_id, index).as_bytes());
    VehicleId::new(hex::encode(digest))
}

/// 교차로 하나에 대한 합성 데이터 생성기.
pub struct SyntheticFeed {
    intersection: IntersectionRef,
    rng: StdRng,
    tick: u64,
    vehicles: Vec<(VehicleId, [f64; 2])>,
}

impl SyntheticFeed {
    /// 새 생성기. `seed`가 있으면 결정적으로 동작합니다.
    pub fn new(intersection: IntersectionRef, vehicles: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let origin = [intersection.longitude, intersection.latitude];
        let vehicles = (0..vehicles)
            .map(|index| {
                let position = [
                    origin[0] + (rng.gen::<f64>() - 0.5) * INITIAL_SPREAD_DEG,
                    origin[1] + (rng.gen::<f64>() - 0.5) * INITIAL_SPREAD_DEG,
                ];
                (vehicle_id(&intersection, index), position)
            })
            .collect();

        Self {
            intersection,
            rng,
            tick: 0,
            vehicles,
        }
    }

    /// 종류별 다음 메시지 본문들 (JSON).
    pub fn next_bodies(&mut self, kind: MessageKind, now: DateTime<Utc>) -> Vec<String> {
        let bodies = match kind {
            MessageKind::Map => vec![serde_json::to_string(&self.map_message(now))],
            MessageKind::Spat => vec![serde_json::to_string(&self.spat_message(now))],
            MessageKind::Bsm => self
                .bsm_messages(now)
                .iter()
                .map(serde_json::to_string)
                .collect(),
        };
        self.tick += 1;
        bodies.into_iter().filter_map(Result::ok).collect()
    }

    /// 합성 MAP.
    pub fn map_message(&self, now: DateTime<Utc>) -> ProcessedMap {
        let origin = [self.intersection.longitude, self.intersection.latitude];
        let approaches = [("north", 0.0, 1.0), ("east", 1.0, 0.0), ("south", 0.0, -1.0), ("west", -1.0, 0.0)];

        let features = approaches
            .iter()
            .enumerate()
            .map(|(i, (approach, dx, dy))| {
                json!({
                    "type": "Feature",
                    "id": i + 1,
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [
                            [origin[0] + dx * LANE_LENGTH_DEG, origin[1] + dy * LANE_LENGTH_DEG],
                            origin,
                        ]
                    },
                    "properties": {
                        "laneId": i + 1,
                        "approach": approach,
                        "ingressApproach": i + 1,
                        "signalGroup": (i as i32 + 1) * 2,
                    }
                })
            })
            .collect();

        let mut map = ProcessedMap::new(
            self.intersection.intersection_id,
            RefPoint {
                latitude: origin[1],
                longitude: origin[0],
                elevation: Some(0.0),
            },
            features,
        );
        map.properties.road_regulator_id = Some(self.intersection.road_regulator_id);
        map.properties.time_stamp = Some(now.to_rfc3339());
        map.properties.ode_received_at = Some(json!(now.timestamp_millis()));
        map
    }

    /// 합성 SPAT (현재 틱의 현시).
    pub fn spat_message(&self, now: DateTime<Utc>) -> ProcessedSpat {
        let stage = (self.tick / STAGE_TICKS) % 4;
        let remaining_ticks = STAGE_TICKS - self.tick % STAGE_TICKS;
        let stage_end = now.timestamp_millis() + (remaining_ticks as i64) * 100;

        let (main, cross) = match stage {
            0 => (GREEN, RED),
            1 => (YELLOW, RED),
            2 => (RED, GREEN),
            _ => (RED, YELLOW),
        };

        let states = [(2, main), (4, cross), (6, main), (8, cross)]
            .into_iter()
            .map(|(signal_group, event_state)| MovementState {
                signal_group,
                state_time_speed: vec![MovementEvent {
                    event_state: event_state.to_string(),
                    timing: Some(json!({ "minEndTime": stage_end, "maxEndTime": stage_end })),
                }],
            })
            .collect();

        ProcessedSpat {
            intersection_id: self.intersection.intersection_id,
            road_regulator_id: Some(self.intersection.road_regulator_id),
            utc_time_stamp: Some(now.timestamp_millis()),
            ode_received_at: Some(json!(now.to_rfc3339())),
            states,
            extra: Default::default(),
        }
    }

    /// 모든 차량을 한 스텝 이동시키고 BSM 생성.
    pub fn bsm_messages(&mut self, now: DateTime<Utc>) -> Vec<BsmFeature> {
        let rng = &mut self.rng;
        self.vehicles
            .iter_mut()
            .map(|(id, position)| {
                position[0] += (rng.gen::<f64>() - 0.5) * WALK_STEP_DEG;
                position[1] += (rng.gen::<f64>() - 0.5) * WALK_STEP_DEG;
                let speed = rng.gen_range(0.0..100.0);
                let heading = rng.gen_range(0.0..360.0);
                BsmFeature::new(id.clone(), position[0], position[1], speed, heading, now)
            })
            .collect()
    }
}
