//! Voice Live WebSocket connection.
//!
//! [`connect`] opens the WebSocket to the Voice Live endpoint and spawns a
//! pump task that owns the socket: outbound [`ClientCommand`]s are drained
//! from an mpsc channel and serialized, inbound text frames are parsed into
//! [`ServerEvent`]s and forwarded on another channel. The caller never
//! touches the socket directly.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::UpstreamError;
use super::events::{ClientCommand, ConversationItem, ServerEvent, SessionConfig};

/// Channel capacity for outbound commands.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for inbound events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// API version that carries MCP support.
pub const VOICE_LIVE_API_VERSION: &str = "2026-01-01-preview";

/// Handle for sending commands to a connected Voice Live session.
///
/// Cheap to clone; all clones feed the same connection. Sends fail with
/// [`UpstreamError::ConnectionClosed`] once the pump task has exited.
#[derive(Debug, Clone)]
pub struct UpstreamHandle {
    commands: mpsc::Sender<ClientCommand>,
}

impl UpstreamHandle {
    /// Push the session configuration.
    pub async fn update_session(&self, session: SessionConfig) -> Result<(), UpstreamError> {
        self.send(ClientCommand::SessionUpdate { session }).await
    }

    /// Append raw PCM bytes to the input audio buffer.
    pub async fn append_audio(&self, pcm: &[u8]) -> Result<(), UpstreamError> {
        self.send(ClientCommand::audio_append(pcm)).await
    }

    /// Submit a tool result anchored to the originating item.
    pub async fn submit_tool_output(
        &self,
        call_id: &str,
        previous_item_id: Option<String>,
        output: &str,
    ) -> Result<(), UpstreamError> {
        self.send(ClientCommand::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
            previous_item_id,
        })
        .await
    }

    /// Answer an MCP approval request.
    pub async fn submit_approval(
        &self,
        approval_request_id: &str,
        approve: bool,
    ) -> Result<(), UpstreamError> {
        self.send(ClientCommand::ConversationItemCreate {
            item: ConversationItem::mcp_approval_response(approval_request_id, approve),
            previous_item_id: None,
        })
        .await
    }

    /// Ask the model to generate a new response.
    pub async fn create_response(&self) -> Result<(), UpstreamError> {
        self.send(ClientCommand::ResponseCreate {}).await
    }

    async fn send(&self, command: ClientCommand) -> Result<(), UpstreamError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| UpstreamError::ConnectionClosed)
    }

    /// Build a handle/receiver pair that is not backed by a socket.
    ///
    /// Used by tests to observe the commands a bridge issues.
    pub fn detached() -> (Self, mpsc::Receiver<ClientCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        (Self { commands: tx }, rx)
    }
}

/// Build the WebSocket URL for a Voice Live endpoint.
///
/// Accepts the HTTPS endpoint from configuration and rewrites the scheme,
/// e.g. `https://foo.cognitiveservices.azure.com` becomes
/// `wss://foo.cognitiveservices.azure.com/voice-live/realtime?...`.
fn build_ws_url(endpoint: &str, model: &str) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| UpstreamError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(UpstreamError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {endpoint}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| UpstreamError::InvalidEndpoint(endpoint.to_string()))?;
    url.set_path("/voice-live/realtime");
    url.query_pairs_mut()
        .append_pair("api-version", VOICE_LIVE_API_VERSION)
        .append_pair("model", model);
    Ok(url)
}

/// Connect to the Voice Live service.
///
/// Returns a command handle and the ordered event stream. The spawned pump
/// task runs until the socket closes, an error occurs, or `cancel` fires;
/// the event channel closing signals the session is over.
pub async fn connect(
    endpoint: &str,
    api_key: &str,
    model: &str,
    cancel: CancellationToken,
) -> Result<(UpstreamHandle, mpsc::Receiver<ServerEvent>), UpstreamError> {
    let url = build_ws_url(endpoint, model)?;
    let host = url
        .host_str()
        .ok_or_else(|| UpstreamError::InvalidEndpoint(endpoint.to_string()))?
        .to_string();

    let request = http::Request::builder()
        .uri(url.as_str())
        .header("api-key", api_key)
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .body(())
        .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

    tracing::info!(model, "Connected to Voice Live");

    let (mut ws_sink, mut ws_source) = ws_stream.split();
    let (command_tx, mut command_rx) = mpsc::channel::<ClientCommand>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }

                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    let json = match serde_json::to_string(&command) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("Failed to serialize command: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                        tracing::error!("Failed to send to Voice Live: {}", e);
                        break;
                    }
                }

                msg = ws_source.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(&text) {
                                Ok(event) => {
                                    if event_tx.send(event).await.is_err() {
                                        // Receiver gone, session is shutting down
                                        break;
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("Unparseable Voice Live event: {} - {}", e, text);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                tracing::error!("Failed to send pong: {}", e);
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Voice Live closed the connection");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::error!("Voice Live WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
            }
        }
        tracing::debug!("Voice Live pump task ended");
    });

    Ok((UpstreamHandle { commands: command_tx }, event_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ws_url_rewrites_scheme() {
        let url = build_ws_url("https://foo.cognitiveservices.azure.com", "gpt-realtime-mini")
            .unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/voice-live/realtime");
        let query = url.query().unwrap();
        assert!(query.contains("api-version=2026-01-01-preview"));
        assert!(query.contains("model=gpt-realtime-mini"));
    }

    #[test]
    fn test_build_ws_url_rejects_bad_scheme() {
        assert!(build_ws_url("ftp://example.com", "m").is_err());
        assert!(build_ws_url("not a url", "m").is_err());
    }

    #[tokio::test]
    async fn test_detached_handle_records_commands() {
        let (handle, mut rx) = UpstreamHandle::detached();
        handle.create_response().await.unwrap();
        match rx.recv().await.unwrap() {
            ClientCommand::ResponseCreate {} => {}
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detached_handle_reports_closed() {
        let (handle, rx) = UpstreamHandle::detached();
        drop(rx);
        let err = handle.create_response().await.unwrap_err();
        assert!(matches!(err, UpstreamError::ConnectionClosed));
    }
}
