//! # Live Core
//!
//! 교차로 실시간 스트림 관리자의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 교차로/차량 식별자 및 토픽 이름 규칙
//! - 뷰포트 경계 (관심 영역 판정)
//! - 교차로 참조 데이터 (IntersectionRef)
//! - MAP / SPAT / BSM 페이로드와 수신 envelope
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
