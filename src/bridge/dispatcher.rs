//! Upstream event dispatch loop.
//!
//! Exactly one task reads the Voice Live event stream: this one. Every
//! event is first offered to the correlation waiters (fan-out, see
//! [`super::correlate`]), then matched exhaustively. Per-event failures are
//! logged and never unwind the loop; the loop ends only when the stream
//! closes, which ends the session.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::BridgeTimeouts;
use super::correlate::EventWaiters;
use super::events::{ClientEvent, ClientSender, TranscriptRole};
use super::tools::{self, ToolCall};
use crate::tools::ToolRegistry;
use crate::upstream::{ConversationItem, EventKind, ItemType, ServerEvent, UpstreamHandle};

pub struct EventDispatcher {
    upstream: UpstreamHandle,
    client: ClientSender,
    waiters: EventWaiters,
    registry: Arc<ToolRegistry>,
    timeouts: BridgeTimeouts,
    /// Tracks spawned tool-call flows so the session can join them
    tracker: TaskTracker,
    /// Session cancellation, honored at every spawned flow's wait points
    cancel: CancellationToken,
}

impl EventDispatcher {
    pub fn new(
        upstream: UpstreamHandle,
        client: ClientSender,
        waiters: EventWaiters,
        registry: Arc<ToolRegistry>,
        timeouts: BridgeTimeouts,
        tracker: TaskTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            upstream,
            client,
            waiters,
            registry,
            timeouts,
            tracker,
            cancel,
        }
    }

    /// Iterate the upstream event stream until it closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ServerEvent>) {
        while let Some(event) = events.recv().await {
            self.waiters.offer(&event);
            self.dispatch(event).await;
        }
        tracing::debug!("Upstream event stream ended");
    }

    async fn dispatch(&self, event: ServerEvent) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(session_id = %session.id, "Voice Live session created");
            }

            ServerEvent::SessionUpdated { session } => {
                tracing::info!(session_id = %session.id, "Session ready");
            }

            ServerEvent::SpeechStarted { .. } => {
                // Barge-in: the client should stop playing agent audio
                self.client.send_event(ClientEvent::SpeechStarted).await;
            }

            ServerEvent::AudioDelta { delta, .. } => match ServerEvent::decode_audio_delta(&delta)
            {
                Ok(pcm) => self.client.send_audio(Bytes::from(pcm)).await,
                Err(e) => tracing::error!("Failed to decode audio delta: {}", e),
            },

            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                self.client
                    .send_event(ClientEvent::Transcript {
                        role: TranscriptRole::Assistant,
                        text: transcript,
                    })
                    .await;
            }

            ServerEvent::InputTranscriptionCompleted { transcript, .. } => {
                self.client
                    .send_event(ClientEvent::Transcript {
                        role: TranscriptRole::User,
                        text: transcript,
                    })
                    .await;
            }

            ServerEvent::ConversationItemCreated { item, .. } => {
                self.handle_item_created(item).await;
            }

            ServerEvent::McpListToolsCompleted { tools } => {
                let labels: Vec<&str> = tools
                    .iter()
                    .map(|t| t.name.as_deref().unwrap_or("?"))
                    .collect();
                tracing::info!(?labels, "MCP tools discovered");
                self.client
                    .send_event(ClientEvent::McpStatus {
                        text: format!("MCP tools available: {}", labels.join(", ")),
                    })
                    .await;
            }

            ServerEvent::McpListToolsFailed {} => {
                tracing::warn!("MCP list-tools failed");
                self.client
                    .send_event(ClientEvent::McpStatus {
                        text: "MCP server tool discovery failed".to_string(),
                    })
                    .await;
            }

            ServerEvent::McpCallInProgress { .. } => {
                tracing::info!("MCP call in progress");
            }

            ServerEvent::McpCallCompleted { .. } => {
                // The service feeds the result to the model itself; we only
                // narrate the finished item and request a fresh response.
                let waiter = self.waiters.subscribe(EventKind::OutputItemDone);
                let upstream = self.upstream.clone();
                let client = self.client.clone();
                let deadline = self.timeouts.mcp_output_wait;
                let cancel = self.cancel.clone();
                self.tracker.spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        result = tools::run_mcp_completion(waiter, upstream, client, deadline) => {
                            if let Err(e) = result {
                                tracing::warn!("MCP completion handling failed: {}", e);
                            }
                        }
                    }
                });
            }

            ServerEvent::McpCallFailed { .. } => {
                tracing::error!("MCP call failed");
                self.client
                    .send_event(ClientEvent::McpStatus {
                        text: "MCP tool call failed".to_string(),
                    })
                    .await;
            }

            ServerEvent::Error { error } => {
                // Protocol-level errors do not terminate the session
                tracing::error!(
                    error_type = ?error.error_type,
                    "Voice Live error: {}",
                    error.message
                );
            }

            // Fanned out to waiters above; nothing to dispatch here
            ServerEvent::FunctionCallArgumentsDone { .. }
            | ServerEvent::ResponseDone { .. }
            | ServerEvent::OutputItemDone { .. } => {}
        }
    }

    /// Route a freshly created conversation item by subtype.
    async fn handle_item_created(&self, item: ConversationItem) {
        match item.item_type {
            ItemType::FunctionCall => self.start_tool_call(item),

            ItemType::McpCall => {
                let name = item.name.as_deref().unwrap_or("unknown");
                let server = item.server_label.as_deref().unwrap_or("");
                tracing::info!(tool = %name, %server, "MCP call created");
                self.client
                    .send_event(ClientEvent::McpStatus {
                        text: format!("Calling MCP tool: {name} on {server}"),
                    })
                    .await;
            }

            ItemType::McpListTools => {
                tracing::info!("MCP list-tools item created");
            }

            ItemType::McpApprovalRequest => {
                let Some(request_id) = item.approval_request_id else {
                    tracing::warn!("Approval request item without an approval_request_id");
                    return;
                };
                if let Err(e) = tools::approve(&self.upstream, &request_id).await {
                    tracing::error!("Failed to submit MCP approval: {}", e);
                }
            }

            // Message items and anything unrecognized are not ours to handle
            _ => {}
        }
    }

    /// Begin the tool-call state machine for a `function_call` item.
    ///
    /// Both waiters are subscribed here, before this loop reads another
    /// event, so the arguments-done and response-done replies cannot be
    /// missed while the spawned flow gets scheduled.
    fn start_tool_call(&self, item: ConversationItem) {
        let (Some(call_id), Some(name)) = (item.call_id.clone(), item.name.clone()) else {
            tracing::warn!("function_call item missing call_id or name");
            return;
        };
        tracing::info!(tool = %name, %call_id, "Tool call");

        let args_waiter = self.waiters.subscribe(EventKind::FunctionCallArgumentsDone);
        let done_waiter = self.waiters.subscribe(EventKind::ResponseDone);
        let call = ToolCall::new(call_id, name.clone(), item.id);
        let registry = self.registry.clone();
        let upstream = self.upstream.clone();
        let deadline = self.timeouts.correlation_wait;
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            let flow =
                tools::run_tool_call(call, args_waiter, done_waiter, registry, upstream, deadline);
            tokio::select! {
                // Shutdown is expected, not a tool failure
                _ = cancel.cancelled() => {}
                result = flow => {
                    if let Err(e) = result {
                        // Abandons only this tool call; the session continues
                        tracing::error!(tool = %name, "Tool call failed: {}", e);
                    }
                }
            }
        });
    }
}
