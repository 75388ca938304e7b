//! 도메인 모델.

pub mod envelope;
pub mod intersection;
pub mod payload;

pub use envelope::*;
pub use intersection::*;
pub use payload::*;
