//! HTTP middleware.

pub mod auth;

pub use auth::{AuthError, auth_middleware};
