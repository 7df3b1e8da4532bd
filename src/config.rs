//! Service configuration.
//!
//! Configuration layers, later layers winning: built-in defaults, then
//! environment variables, then an optional YAML file on top. The file only
//! overrides the settings it names, so a sparse file composes with env.
//! The Voice Live credentials normally arrive through the environment
//! (`AZURE_VOICE_LIVE_ENDPOINT`, `AZURE_VOICE_LIVE_API_KEY`,
//! `VOICE_LIVE_MODEL`); everything else has sensible defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::session::{DEFAULT_INSTRUCTIONS, DEFAULT_TRANSCRIPTION_MODEL, DEFAULT_VOICE};

/// Default realtime model deployment.
pub const DEFAULT_MODEL: &str = "gpt-realtime-mini";

/// Errors producing a usable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file was not valid YAML
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting is absent after all layers applied
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Voice Live connection settings
    pub voice_live: VoiceLiveConfig,
    /// Per-session agent settings
    pub agent: AgentConfig,
    /// Client authentication settings
    pub auth: AuthConfig,
    /// Path to the MCP server list; omitted means the built-in list
    pub mcp_config: Option<PathBuf>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Directory of static frontend files; omitted disables the frontend
    pub static_dir: Option<PathBuf>,
    /// CORS allowed origins; empty means same-origin only
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: Some(PathBuf::from("frontend")),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Voice Live resource settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceLiveConfig {
    /// Resource endpoint (https URL)
    pub endpoint: String,
    /// API key
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Realtime model deployment name
    pub model: String,
}

/// Agent behavior settings shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Output voice name
    pub voice: String,
    /// System instructions
    pub instructions: String,
    /// Input transcription model
    pub transcription_model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

/// Client authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared bearer token; omitted disables authentication
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Config {
    /// Load configuration: defaults, then env, then the optional file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env();
        if let Some(path) = path {
            config.apply_file(path)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay a YAML config file; settings the file names win.
    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        file.apply(self);
        Ok(())
    }

    /// Overlay environment variables.
    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("AZURE_VOICE_LIVE_ENDPOINT") {
            self.voice_live.endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var("AZURE_VOICE_LIVE_API_KEY") {
            self.voice_live.api_key = api_key;
        }
        if let Ok(model) = std::env::var("VOICE_LIVE_MODEL") {
            self.voice_live.model = model;
        }
        if let Ok(host) = std::env::var("BRIDGE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BRIDGE_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
        if let Ok(token) = std::env::var("BRIDGE_AUTH_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Ok(path) = std::env::var("BRIDGE_MCP_CONFIG") {
            self.mcp_config = Some(PathBuf::from(path));
        }
    }

    /// Check required settings and fill remaining defaults.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.voice_live.endpoint.is_empty() {
            return Err(ConfigError::Missing("voice_live.endpoint"));
        }
        if self.voice_live.api_key.is_empty() {
            return Err(ConfigError::Missing("voice_live.api_key"));
        }
        if self.voice_live.model.is_empty() {
            self.voice_live.model = DEFAULT_MODEL.to_string();
        }
        Ok(())
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// On-disk config shape: every setting optional, so the file overrides
/// exactly what it names and nothing else.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFile,
    voice_live: VoiceLiveFile,
    agent: AgentFile,
    auth: AuthFile,
    mcp_config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerFile {
    host: Option<String>,
    port: Option<u16>,
    static_dir: Option<PathBuf>,
    cors_allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VoiceLiveFile {
    endpoint: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentFile {
    voice: Option<String>,
    instructions: Option<String>,
    transcription_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthFile {
    token: Option<String>,
}

impl ConfigFile {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.server.host {
            config.server.host = host;
        }
        if let Some(port) = self.server.port {
            config.server.port = port;
        }
        if let Some(static_dir) = self.server.static_dir {
            config.server.static_dir = Some(static_dir);
        }
        if let Some(origins) = self.server.cors_allowed_origins {
            config.server.cors_allowed_origins = origins;
        }
        if let Some(endpoint) = self.voice_live.endpoint {
            config.voice_live.endpoint = endpoint;
        }
        if let Some(api_key) = self.voice_live.api_key {
            config.voice_live.api_key = api_key;
        }
        if let Some(model) = self.voice_live.model {
            config.voice_live.model = model;
        }
        if let Some(voice) = self.agent.voice {
            config.agent.voice = voice;
        }
        if let Some(instructions) = self.agent.instructions {
            config.agent.instructions = instructions;
        }
        if let Some(model) = self.agent.transcription_model {
            config.agent.transcription_model = model;
        }
        if let Some(token) = self.auth.token {
            config.auth.token = Some(token);
        }
        if let Some(mcp_config) = self.mcp_config {
            config.mcp_config = Some(mcp_config);
        }
    }
}
