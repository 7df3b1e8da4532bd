//! Voice Live upstream connection and wire protocol.
//!
//! The bridge talks to the Azure Voice Live realtime API over a WebSocket.
//! [`events`] defines the JSON command/event types; [`session`] owns the
//! connection and exposes it as channels so the session bridge never deals
//! with sockets directly.

use thiserror::Error;

pub mod events;
pub mod session;

pub use events::{
    ClientCommand, ConversationItem, EventKind, InputAudioTranscription, ItemType, ServerEvent,
    SessionConfig, SessionTool, TurnDetection, VoiceConfig,
};
pub use session::{UpstreamHandle, VOICE_LIVE_API_VERSION, connect};

/// Errors from the upstream connection.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured endpoint could not be turned into a WebSocket URL
    #[error("Invalid Voice Live endpoint: {0}")]
    InvalidEndpoint(String),

    /// The WebSocket handshake failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection pump has exited; the session is over
    #[error("Voice Live connection closed")]
    ConnectionClosed,
}
