//! Voice Live session bridge.
//!
//! A WebSocket service that bridges browser clients to the Azure Voice
//! Live realtime API: raw PCM16 audio in both directions, a small JSON
//! event protocol toward the client, local function-tool dispatch, and
//! service-side MCP tool narration.
//!
//! Module map:
//! - [`upstream`] - Voice Live connection and wire protocol
//! - [`bridge`] - per-session relay, event dispatch, tool coordination
//! - [`tools`] - local function registry and MCP server configuration
//! - [`config`], [`state`] - startup configuration and shared state
//! - [`routes`], [`handlers`], [`middleware`] - the HTTP surface

pub mod bridge;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod tools;
pub mod upstream;

pub use config::{Config, ConfigError};
pub use state::AppState;
