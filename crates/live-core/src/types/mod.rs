//! 식별자, 토픽, 뷰포트 경계 등 기본 타입.

pub mod bounds;
pub mod ids;
pub mod topic;

pub use bounds::*;
pub use ids::*;
pub use topic::*;
