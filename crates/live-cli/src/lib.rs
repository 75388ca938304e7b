//! 교차로 실시간 스트림 CLI.
//!
//! - `run`: 디렉토리와 관심 영역으로 관리자를 실행하고 주기 스냅샷을 출력
//! - `directory`: 교차로 디렉토리 출력

pub mod commands;

pub use commands::*;
