//! Tooling the model can call: local functions and MCP servers.

pub mod mcp;
pub mod registry;

pub use mcp::{McpConfigError, McpServerConfig, load_servers};
pub use registry::{ToolHandler, ToolRegistry};
