//! MCP server configuration.
//!
//! MCP servers are advertised to the Voice Live session alongside the
//! local functions; the service connects to them and executes their tools
//! itself, the bridge only observes the lifecycle events. Servers are
//! listed in a YAML file so deployments can swap them without a rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upstream::SessionTool;

/// One MCP server entry from the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Label identifying the server in session events
    pub server_label: String,
    /// Server endpoint URL
    pub server_url: String,
    /// Approval policy; defaults to "always" when omitted
    #[serde(default)]
    pub require_approval: Option<String>,
}

impl McpServerConfig {
    /// The session tool entry advertising this server.
    pub fn to_session_tool(&self) -> SessionTool {
        SessionTool::Mcp {
            server_label: self.server_label.clone(),
            server_url: self.server_url.clone(),
            require_approval: Some(
                self.require_approval
                    .clone()
                    .unwrap_or_else(|| "always".to_string()),
            ),
        }
    }

    /// The out-of-the-box server list: Microsoft Learn documentation.
    pub fn default_servers() -> Vec<Self> {
        vec![Self {
            server_label: "microsoft-docs".to_string(),
            server_url: "https://learn.microsoft.com/api/mcp".to_string(),
            require_approval: Some("always".to_string()),
        }]
    }
}

/// Errors loading the MCP server list.
#[derive(Debug, Error)]
pub enum McpConfigError {
    /// The file could not be read
    #[error("Failed to read MCP config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file was not valid YAML
    #[error("Failed to parse MCP config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level shape of the YAML file.
#[derive(Debug, Deserialize)]
struct McpConfigFile {
    #[serde(default)]
    mcp_servers: Vec<McpServerConfig>,
}

/// Load the MCP server list from a YAML file.
pub fn load_servers(path: impl AsRef<Path>) -> Result<Vec<McpServerConfig>, McpConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| McpConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: McpConfigFile =
        serde_yaml::from_str(&text).map_err(|source| McpConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(file.mcp_servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_servers_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mcp_servers:\n  - server_label: docs\n    server_url: https://example.com/mcp\n  - server_label: wiki\n    server_url: https://wiki.example.com/mcp\n    require_approval: never"
        )
        .unwrap();

        let servers = load_servers(file.path()).unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].server_label, "docs");
        assert!(servers[0].require_approval.is_none());
        assert_eq!(servers[1].require_approval.as_deref(), Some("never"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_servers("/nonexistent/mcp.yaml").unwrap_err();
        assert!(matches!(err, McpConfigError::Io { .. }));
    }

    #[test]
    fn test_to_session_tool_defaults_approval() {
        let config = McpServerConfig {
            server_label: "docs".to_string(),
            server_url: "https://example.com/mcp".to_string(),
            require_approval: None,
        };
        match config.to_session_tool() {
            SessionTool::Mcp {
                require_approval, ..
            } => assert_eq!(require_approval.as_deref(), Some("always")),
            other => panic!("unexpected tool: {other:?}"),
        }
    }

    #[test]
    fn test_default_servers_include_docs() {
        let servers = McpServerConfig::default_servers();
        assert_eq!(servers[0].server_label, "microsoft-docs");
    }
}
