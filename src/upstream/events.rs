//! Voice Live WebSocket message types.
//!
//! This module defines the command and event types exchanged with the Azure
//! Voice Live realtime API. All messages are JSON-encoded and sent over
//! WebSocket.
//!
//! # Protocol Overview
//!
//! Commands (sent to the service):
//! - session.update - Push session configuration
//! - input_audio_buffer.append - Append base64 audio to the input buffer
//! - conversation.item.create - Add an item (tool output, MCP approval)
//! - response.create - Ask the model to generate a new response
//!
//! Events (received from the service):
//! - session.created / session.updated - Session lifecycle
//! - input_audio_buffer.speech_started - User started talking (barge-in)
//! - response.audio.delta - Agent audio chunk
//! - response.audio_transcript.done - Agent transcript complete
//! - conversation.item.input_audio_transcription.completed - User transcript
//! - conversation.item.created - New conversation item (function call, MCP)
//! - response.function_call_arguments.done - Tool arguments complete
//! - response.done / response.output_item.done - Response lifecycle
//! - mcp_list_tools.completed / mcp_list_tools.failed - MCP tool discovery
//! - response.mcp_call.in_progress / completed / failed - MCP call lifecycle
//! - error - Service-side error

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration pushed via `session.update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Advertised tools: local functions plus MCP servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<SessionTool>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Voice selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Voice type (e.g. "azure-standard")
    #[serde(rename = "type")]
    pub voice_type: String,
    /// Voice name
    pub name: String,
}

impl VoiceConfig {
    /// An Azure standard neural voice.
    pub fn azure_standard(name: impl Into<String>) -> Self {
        Self {
            voice_type: "azure-standard".to_string(),
            name: name.into(),
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// No turn detection
    #[serde(rename = "none")]
    None {},
}

/// A tool advertised to the session: a local function or an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionTool {
    /// Locally dispatched function
    #[serde(rename = "function")]
    Function {
        /// Function name
        name: String,
        /// Function description
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Function parameters JSON schema
        #[serde(skip_serializing_if = "Option::is_none")]
        parameters: Option<serde_json::Value>,
    },
    /// Externally hosted MCP server, executed by the service
    #[serde(rename = "mcp")]
    Mcp {
        /// Label identifying the server in events
        server_label: String,
        /// Server endpoint URL
        server_url: String,
        /// Approval policy ("always", "never")
        #[serde(skip_serializing_if = "Option::is_none")]
        require_approval: Option<String>,
    },
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Message,
    FunctionCall,
    FunctionCallOutput,
    McpCall,
    McpListTools,
    McpApprovalRequest,
    McpApprovalResponse,
    /// Anything this bridge does not handle
    #[serde(other)]
    Other,
}

/// Conversation item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item subtype
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Call ID for function calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function or MCP tool name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments (JSON string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function or MCP call output (JSON string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// MCP server label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_label: Option<String>,
    /// MCP approval request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_request_id: Option<String>,
    /// MCP approval decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approve: Option<bool>,
}

impl ConversationItem {
    /// A `function_call_output` item carrying a tool result.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: ItemType::FunctionCallOutput,
            call_id: Some(call_id.into()),
            name: None,
            arguments: None,
            output: Some(output.into()),
            server_label: None,
            approval_request_id: None,
            approve: None,
        }
    }

    /// An `mcp_approval_response` item answering an approval request.
    pub fn mcp_approval_response(approval_request_id: impl Into<String>, approve: bool) -> Self {
        Self {
            id: None,
            item_type: ItemType::McpApprovalResponse,
            call_id: None,
            name: None,
            arguments: None,
            output: None,
            server_label: None,
            approval_request_id: Some(approval_request_id.into()),
            approve: Some(approve),
        }
    }
}

// =============================================================================
// Commands (sent to the service)
// =============================================================================

/// Commands sent to the Voice Live service.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Push session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
        /// Item ID to anchor after
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
    },

    /// Ask the model to generate a new response
    #[serde(rename = "response.create")]
    ResponseCreate {},
}

impl ClientCommand {
    /// Create an audio append command from raw PCM bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientCommand::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }
}

// =============================================================================
// Events (received from the service)
// =============================================================================

/// Events received from the Voice Live service.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Service-side error
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: SessionInfo,
    },

    /// Session configuration acknowledged
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: SessionInfo,
    },

    /// VAD detected the user talking (barge-in)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio start timestamp in ms
        #[serde(default)]
        audio_start_ms: Option<u64>,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Agent audio chunk
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio delta
        delta: String,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Agent transcript complete
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        /// Full transcript
        transcript: String,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// User transcript complete
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        /// Transcript text
        transcript: String,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Conversation item created
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        /// Previous item ID
        #[serde(default)]
        previous_item_id: Option<String>,
        /// Created item
        item: ConversationItem,
    },

    /// Function call arguments complete
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Call ID
        call_id: String,
        /// Full arguments (JSON string)
        arguments: String,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Response generation complete
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response summary
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    /// Output item fully produced
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Item
        item: ConversationItem,
    },

    /// MCP tool discovery finished
    #[serde(rename = "mcp_list_tools.completed")]
    McpListToolsCompleted {
        /// Discovered tools
        #[serde(default)]
        tools: Vec<McpToolInfo>,
    },

    /// MCP tool discovery failed
    #[serde(rename = "mcp_list_tools.failed")]
    McpListToolsFailed {},

    /// MCP call started on the service side
    #[serde(rename = "response.mcp_call.in_progress")]
    McpCallInProgress {
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// MCP call finished; the service feeds the result to the model itself
    #[serde(rename = "response.mcp_call.completed")]
    McpCallCompleted {
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// MCP call failed on the service side
    #[serde(rename = "response.mcp_call.failed")]
    McpCallFailed {
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },
}

/// Discriminant for correlation waits, one per [`ServerEvent`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    SessionCreated,
    SessionUpdated,
    SpeechStarted,
    AudioDelta,
    AudioTranscriptDone,
    InputTranscriptionCompleted,
    ConversationItemCreated,
    FunctionCallArgumentsDone,
    ResponseDone,
    OutputItemDone,
    McpListToolsCompleted,
    McpListToolsFailed,
    McpCallInProgress,
    McpCallCompleted,
    McpCallFailed,
}

impl ServerEvent {
    /// The correlation key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Error { .. } => EventKind::Error,
            ServerEvent::SessionCreated { .. } => EventKind::SessionCreated,
            ServerEvent::SessionUpdated { .. } => EventKind::SessionUpdated,
            ServerEvent::SpeechStarted { .. } => EventKind::SpeechStarted,
            ServerEvent::AudioDelta { .. } => EventKind::AudioDelta,
            ServerEvent::AudioTranscriptDone { .. } => EventKind::AudioTranscriptDone,
            ServerEvent::InputTranscriptionCompleted { .. } => {
                EventKind::InputTranscriptionCompleted
            }
            ServerEvent::ConversationItemCreated { .. } => EventKind::ConversationItemCreated,
            ServerEvent::FunctionCallArgumentsDone { .. } => EventKind::FunctionCallArgumentsDone,
            ServerEvent::ResponseDone { .. } => EventKind::ResponseDone,
            ServerEvent::OutputItemDone { .. } => EventKind::OutputItemDone,
            ServerEvent::McpListToolsCompleted { .. } => EventKind::McpListToolsCompleted,
            ServerEvent::McpListToolsFailed { .. } => EventKind::McpListToolsFailed,
            ServerEvent::McpCallInProgress { .. } => EventKind::McpCallInProgress,
            ServerEvent::McpCallCompleted { .. } => EventKind::McpCallCompleted,
            ServerEvent::McpCallFailed { .. } => EventKind::McpCallFailed,
        }
    }

    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// Service error information.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    pub message: String,
}

/// Session information carried by session lifecycle events.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    pub id: String,
    /// Model in use
    #[serde(default)]
    pub model: Option<String>,
}

/// Response summary carried by `response.done`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInfo {
    /// Response ID
    #[serde(default)]
    pub id: Option<String>,
    /// Response status
    #[serde(default)]
    pub status: Option<String>,
}

/// MCP tool descriptor from `mcp_list_tools.completed`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolInfo {
    /// Tool name
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
