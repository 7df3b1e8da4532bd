//! Shared application state.

use std::sync::Arc;

use thiserror::Error;

use crate::bridge::{BridgeTimeouts, SessionParams};
use crate::config::Config;
use crate::tools::{self, McpConfigError, McpServerConfig, ToolRegistry};
use crate::upstream::SessionTool;

/// Errors building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The MCP server list could not be loaded
    #[error(transparent)]
    McpConfig(#[from] McpConfigError),
}

/// State shared by every request handler.
///
/// Everything here is immutable after startup; per-session state lives in
/// the session bridge each WebSocket connection creates.
#[derive(Debug)]
pub struct AppState {
    /// Service configuration
    pub config: Config,
    /// Local function tools, shared across sessions
    pub tools: Arc<ToolRegistry>,
    /// MCP servers advertised to every session
    pub mcp_servers: Vec<SessionTool>,
}

impl AppState {
    /// Build the state: resolve the MCP server list and the tool registry.
    pub fn new(config: Config) -> Result<Arc<Self>, StateError> {
        let servers = match &config.mcp_config {
            Some(path) => tools::load_servers(path)?,
            None => McpServerConfig::default_servers(),
        };
        let mcp_servers = servers.iter().map(McpServerConfig::to_session_tool).collect();

        Ok(Arc::new(Self {
            config,
            tools: Arc::new(ToolRegistry::builtin()),
            mcp_servers,
        }))
    }

    /// Parameters for one new session.
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            endpoint: self.config.voice_live.endpoint.clone(),
            api_key: self.config.voice_live.api_key.clone(),
            model: self.config.voice_live.model.clone(),
            voice: self.config.agent.voice.clone(),
            instructions: self.config.agent.instructions.clone(),
            transcription_model: self.config.agent.transcription_model.clone(),
            mcp_servers: self.mcp_servers.clone(),
            timeouts: BridgeTimeouts::default(),
        }
    }
}
