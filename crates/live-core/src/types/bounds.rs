//! 지도 뷰포트 경계.
//!
//! 관심 교차로 판정에 사용하는 경도/위도 사각형입니다. 서쪽 경도가 동쪽보다 크면
//! 날짜 변경선을 가로지르는 경계로 취급합니다.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::CoreError;

/// 경도/위도 좌표.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    /// 새 좌표 생성.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// 뷰포트 경계 (남서, 북동 꼭짓점).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBounds {
    pub south_west: LngLat,
    pub north_east: LngLat,
}

impl ViewBounds {
    /// 새 경계 생성.
    pub fn new(south_west: LngLat, north_east: LngLat) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// `west, south, east, north` 순서로 생성.
    pub fn from_edges(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(LngLat::new(west, south), LngLat::new(east, north))
    }

    /// 점이 경계 안에 있는지 확인 (경계선 포함).
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        let in_lat = self.south_west.lat <= lat && lat <= self.north_east.lat;

        let west = self.south_west.lng;
        let east = self.north_east.lng;
        let in_lng = if west > east {
            // 날짜 변경선을 가로지름
            west <= lng || lng <= east
        } else {
            west <= lng && lng <= east
        };

        in_lat && in_lng
    }
}

impl FromStr for ViewBounds {
    type Err = CoreError;

    /// `west,south,east,north` 형식 파싱.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| CoreError::InvalidBounds(format!("{}: {}", s, e)))?;

        if values.len() != 4 {
            return Err(CoreError::InvalidBounds(format!(
                "expected west,south,east,north but got {} values",
                values.len()
            )));
        }

        if values[1] > values[3] {
            return Err(CoreError::InvalidBounds(format!(
                "south ({}) is above north ({})",
                values[1], values[3]
            )));
        }

        Ok(Self::from_edges(values[0], values[1], values[2], values[3]))
    }
}
