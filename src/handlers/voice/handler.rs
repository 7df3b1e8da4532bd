//! Voice session WebSocket handler.
//!
//! Each connection gets its own [`SessionBridge`]: the socket read loop
//! feeds client audio into the bridge, a writer task drains bridge frames
//! back to the socket, and the bridge itself owns the upstream Voice Live
//! session. When the client disconnects the bridge is shut down; when the
//! bridge ends first, the terminal event is flushed and the socket closed.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use crate::bridge::{ClientFrame, ClientSender, SessionBridge};
use crate::state::AppState;

/// Client-bound frame buffer; sized for audio bursts.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket message size (10 MB).
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Upgrade the connection and run a voice session over it.
pub async fn voice_ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Voice WebSocket upgrade requested");
    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_voice_socket(socket, state))
}

async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("Voice WebSocket connection established");

    let (mut sink, mut source) = socket.split();
    let (client, mut frames) = ClientSender::channel(CHANNEL_BUFFER_SIZE);

    // Writer task: drains bridge frames until every ClientSender is gone,
    // so the terminal event is flushed before the close frame.
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let result = match frame {
                ClientFrame::Audio(pcm) => sink.send(Message::Binary(pcm)).await,
                ClientFrame::Event(event) => match serde_json::to_string(&event) {
                    Ok(json) => sink.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize client event: {}", e);
                        continue;
                    }
                },
            };
            if let Err(e) = result {
                warn!("Client send failed: {}", e);
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let bridge = Arc::new(SessionBridge::new(
        state.session_params(),
        state.tools.clone(),
        client,
    ));
    let session = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run().await })
    };

    while let Some(msg) = source.next().await {
        match msg {
            Ok(Message::Binary(pcm)) => bridge.send_audio(pcm).await,
            // No client-to-server text protocol; ignore text frames
            Ok(Message::Text(_)) => {}
            Ok(Message::Close(_)) => {
                info!("Client closed the voice connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Voice WebSocket error: {}", e);
                break;
            }
        }
    }

    bridge.shutdown();
    if let Err(e) = session.await {
        error!("Session task panicked: {}", e);
    }

    // Last ClientSender drops here; the writer flushes and closes.
    drop(bridge);
    if let Err(e) = writer.await {
        error!("Writer task panicked: {}", e);
    }
    info!("Voice WebSocket connection finished");
}
