//! Session controller: one client connection, one Voice Live session.
//!
//! [`SessionBridge::run`] connects upstream, pushes the session
//! configuration, then supervises the two relay directions until either
//! side ends or [`SessionBridge::shutdown`] is called. Whatever happens
//! inside, `run` emits exactly one terminal `call_state: ended` event to
//! the client, and it is the last event the client sees.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::audio;
use super::correlate::EventWaiters;
use super::dispatcher::EventDispatcher;
use super::events::{ClientEvent, ClientSender};
use crate::tools::ToolRegistry;
use crate::upstream::{
    self, InputAudioTranscription, ServerEvent, SessionConfig, SessionTool, TurnDetection,
    UpstreamError, UpstreamHandle, VoiceConfig,
};

/// System prompt pushed with the session configuration.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a helpful voice assistant. Be polite, concise, and do what the user asks.
You have access to external tools via MCP servers — use them when the user asks
questions about Microsoft documentation, Azure services, .NET, or similar topics.
";

/// Default output voice.
pub const DEFAULT_VOICE: &str = "en-US-Emma2:DragonHDLatestNeural";

/// Default input transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Capacity of the client-to-upstream audio queue.
const AUDIO_QUEUE_CAPACITY: usize = 256;

/// Everything a session needs to connect and configure itself.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Voice Live resource endpoint (https URL)
    pub endpoint: String,
    /// API key for the resource
    pub api_key: String,
    /// Realtime model deployment name
    pub model: String,
    /// Output voice name
    pub voice: String,
    /// System instructions
    pub instructions: String,
    /// Input transcription model
    pub transcription_model: String,
    /// MCP servers to advertise alongside the local functions
    pub mcp_servers: Vec<SessionTool>,
    /// Wait deadlines and poll intervals
    pub timeouts: super::BridgeTimeouts,
}

/// Bridge between one client connection and one Voice Live session.
pub struct SessionBridge {
    /// Correlates this session's log lines
    id: String,
    params: SessionParams,
    registry: Arc<ToolRegistry>,
    client: ClientSender,
    audio_tx: mpsc::Sender<Bytes>,
    /// Taken exactly once by the first `run`
    audio_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Bytes>>>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl SessionBridge {
    pub fn new(params: SessionParams, registry: Arc<ToolRegistry>, client: ClientSender) -> Self {
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_QUEUE_CAPACITY);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            params,
            registry,
            client,
            audio_tx,
            audio_rx: tokio::sync::Mutex::new(Some(audio_rx)),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    /// Whether the session is currently accepting audio.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue a client audio frame for the upstream relay.
    ///
    /// Silently ignored once the session stops running. While running, no
    /// frame is ever dropped: a full queue backpressures the caller until
    /// the relay drains it.
    pub async fn send_audio(&self, frame: Bytes) {
        if !self.is_running() {
            return;
        }
        let _ = self.audio_tx.send(frame).await;
    }

    /// Stop the session. Idempotent; safe to call from any task.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Run the session to completion.
    ///
    /// Connects, configures, relays, and finally emits the terminal
    /// `call_state: ended` event, regardless of how the session ended.
    pub async fn run(&self) {
        tracing::info!(session = %self.id, model = %self.params.model, "Session starting");
        self.running.store(true, Ordering::SeqCst);
        if let Err(e) = self.open_and_drive().await {
            tracing::error!(session = %self.id, "Session ended with error: {}", e);
        }
        self.finish().await;
    }

    /// Run the session over an already-established connection.
    ///
    /// Tests use this to drive the bridge over plain channels.
    pub async fn run_with_connection(
        &self,
        upstream: UpstreamHandle,
        events: mpsc::Receiver<ServerEvent>,
    ) {
        self.running.store(true, Ordering::SeqCst);
        self.drive(upstream, events).await;
        self.finish().await;
    }

    async fn open_and_drive(&self) -> Result<(), UpstreamError> {
        let (upstream, events) = upstream::connect(
            &self.params.endpoint,
            &self.params.api_key,
            &self.params.model,
            self.cancel.child_token(),
        )
        .await?;

        upstream.update_session(self.session_config()).await?;
        self.drive(upstream, events).await;
        Ok(())
    }

    /// Supervise the relay tasks until one direction ends or shutdown.
    async fn drive(&self, upstream: UpstreamHandle, events: mpsc::Receiver<ServerEvent>) {
        let Some(audio_rx) = self.audio_rx.lock().await.take() else {
            tracing::error!("Session was already run once");
            return;
        };

        let waiters = EventWaiters::new();
        let tracker = TaskTracker::new();
        let dispatcher = EventDispatcher::new(
            upstream.clone(),
            self.client.clone(),
            waiters,
            self.registry.clone(),
            self.params.timeouts,
            tracker.clone(),
            self.cancel.clone(),
        );

        tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::info!("Session cancelled");
            }
            _ = dispatcher.run(events) => {
                tracing::info!("Upstream closed, session over");
            }
            _ = audio::run_sender(
                audio_rx,
                upstream,
                self.running.clone(),
                self.params.timeouts.audio_poll,
            ) => {
                tracing::info!("Audio relay ended, session over");
            }
        }

        // Unblock any in-flight tool-call flows, then join them
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        tracker.close();
        tracker.wait().await;
    }

    /// Emit the terminal event. Always the last thing the client sees.
    async fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        self.client.send_event(ClientEvent::call_ended()).await;
        tracing::info!(session = %self.id, "Session finished");
    }

    /// The `session.update` payload for this session.
    fn session_config(&self) -> SessionConfig {
        let mut tools = self.registry.session_tools();
        tools.extend(self.params.mcp_servers.iter().cloned());

        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(self.params.instructions.clone()),
            voice: Some(VoiceConfig::azure_standard(&self.params.voice)),
            input_audio_format: Some("pcm16".to_string()),
            output_audio_format: Some("pcm16".to_string()),
            input_audio_transcription: Some(InputAudioTranscription {
                model: self.params.transcription_model.clone(),
            }),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: Some(0.5),
                prefix_padding_ms: Some(300),
                silence_duration_ms: Some(500),
            }),
            tools: Some(tools),
            tool_choice: Some("auto".to_string()),
        }
    }
}
