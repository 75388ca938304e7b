//! 교차로 실시간 피드 연결 클라이언트.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - ConnectionClient trait: 교차로 피드 하나에 대한 실시간 연결
//! - STOMP over WebSocket 클라이언트 (프레임 코덱 + 세션 드라이버)
//! - 시뮬레이션 클라이언트 (합성 MAP/SPAT/BSM)
//! - 재연결 백오프 정책
//! - 설정 기반 클라이언트 팩토리

pub mod error;
pub mod factory;
pub mod reconnect;
pub mod simulated;
pub mod stomp;
pub mod traits;

pub use error::*;
pub use factory::{build_factory, SimulatedConnectionFactory, StompConnectionFactory};
pub use reconnect::ReconnectPolicy;
pub use simulated::{sample_directory, SimulatedClient, SyntheticFeed};
pub use stomp::StompClient;
pub use traits::*;
