//! The per-connection session bridge.
//!
//! One [`session::SessionBridge`] owns one client connection and one Voice
//! Live session end to end. Its parts:
//!
//! - [`session`] - session controller: setup, task supervision, shutdown
//! - [`audio`] - upstream-bound FIFO audio relay
//! - [`dispatcher`] - single reader of the upstream event stream
//! - [`correlate`] - bounded one-shot waits keyed by event kind
//! - [`tools`] - tool-call state machine and MCP approval/completion flows
//! - [`events`] - the client-facing JSON event protocol

use std::time::Duration;

pub mod audio;
pub mod correlate;
pub mod dispatcher;
pub mod events;
pub mod session;
pub mod tools;

pub use correlate::{CorrelationError, EventWaiter, EventWaiters};
pub use events::{ClientEvent, ClientFrame, ClientSender, TranscriptRole};
pub use session::{SessionBridge, SessionParams};
pub use tools::{ToolCall, ToolCallError, ToolCallState};

/// All timeouts the bridge observes. Tests shrink these to milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct BridgeTimeouts {
    /// Deadline for tool-call correlation waits
    pub correlation_wait: Duration,
    /// Deadline for the MCP output-item wait
    pub mcp_output_wait: Duration,
    /// Audio queue poll interval (bounds shutdown observation)
    pub audio_poll: Duration,
}

impl Default for BridgeTimeouts {
    fn default() -> Self {
        Self {
            correlation_wait: correlate::DEFAULT_WAIT,
            mcp_output_wait: correlate::MCP_OUTPUT_WAIT,
            audio_poll: audio::QUEUE_POLL,
        }
    }
}
