//! 시뮬레이션 전송 (합성 데이터).

pub mod client;
pub mod directory;
pub mod generator;

pub use client::SimulatedClient;
pub use directory::sample_directory;
pub use generator::{vehicle_id, SyntheticFeed};
