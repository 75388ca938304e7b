//! STOMP over WebSocket 전송.

pub mod client;
pub mod frame;

pub use client::StompClient;
pub use frame::{decode_frames, Frame, StompCommand};
