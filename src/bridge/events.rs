//! Client-facing event protocol.
//!
//! The bridge talks to its client over one WebSocket: binary frames carry
//! raw PCM16-LE audio, text frames carry the JSON events defined here.
//! Events flow server→client only; client text frames are ignored.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Transcript speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

/// JSON text events sent to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// The user started talking; the client should stop local playback
    #[serde(rename = "speech_started")]
    SpeechStarted,

    /// A completed transcript line
    #[serde(rename = "transcript")]
    Transcript {
        /// Speaker role
        role: TranscriptRole,
        /// Transcript text
        text: String,
    },

    /// Session lifecycle; `state` is always "ended"
    #[serde(rename = "call_state")]
    CallState {
        /// Lifecycle state
        state: String,
    },

    /// Remote-tool (MCP) status narration
    #[serde(rename = "mcp_status")]
    McpStatus {
        /// Human-readable status line
        text: String,
    },
}

impl ClientEvent {
    /// The single terminal event every session emits.
    pub fn call_ended() -> Self {
        ClientEvent::CallState {
            state: "ended".to_string(),
        }
    }
}

/// A frame bound for the client transport.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    /// Raw PCM16-LE audio, forwarded as a binary frame
    Audio(Bytes),
    /// A JSON event, forwarded as a text frame
    Event(ClientEvent),
}

/// Sender half of the client transport.
///
/// Send failures are swallowed: a closed channel means the client already
/// disconnected, which never aborts the session on its own.
#[derive(Debug, Clone)]
pub struct ClientSender {
    frames: mpsc::Sender<ClientFrame>,
}

impl ClientSender {
    pub fn new(frames: mpsc::Sender<ClientFrame>) -> Self {
        Self { frames }
    }

    /// Build a sender together with the receiving end of its transport.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClientFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Forward an audio chunk to the client.
    pub async fn send_audio(&self, pcm: Bytes) {
        let _ = self.frames.send(ClientFrame::Audio(pcm)).await;
    }

    /// Send a JSON event to the client.
    pub async fn send_event(&self, event: ClientEvent) {
        let _ = self.frames.send(ClientFrame::Event(event)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shapes() {
        let json = serde_json::to_string(&ClientEvent::SpeechStarted).unwrap();
        assert_eq!(json, r#"{"type":"speech_started"}"#);

        let json = serde_json::to_string(&ClientEvent::call_ended()).unwrap();
        assert_eq!(json, r#"{"type":"call_state","state":"ended"}"#);

        let json = serde_json::to_string(&ClientEvent::Transcript {
            role: TranscriptRole::Assistant,
            text: "hello".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"transcript","role":"assistant","text":"hello"}"#
        );

        let json = serde_json::to_string(&ClientEvent::McpStatus {
            text: "MCP tools available: search".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"mcp_status""#));
    }

    #[tokio::test]
    async fn test_send_after_disconnect_is_swallowed() {
        let (tx, rx) = mpsc::channel(1);
        let sender = ClientSender::new(tx);
        drop(rx);
        // Must not panic or error
        sender.send_event(ClientEvent::SpeechStarted).await;
        sender.send_audio(Bytes::from_static(b"\x00\x01")).await;
    }
}
