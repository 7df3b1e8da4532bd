//! Voice session WebSocket endpoint.

pub mod handler;

pub use handler::voice_ws_handler;
