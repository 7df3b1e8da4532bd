//! Client authentication.
//!
//! A single shared bearer token guards every route when configured. The
//! token arrives in the `Authorization: Bearer <token>` header, or in a
//! `?token=` query parameter for browser WebSocket clients, which cannot
//! set headers on the upgrade request.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::state::AppState;

/// Authentication failures, all answered with 401.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token in the header or query string
    #[error("Missing authentication token")]
    MissingToken,

    /// The Authorization header was not a bearer token
    #[error("Invalid Authorization header")]
    InvalidAuthHeader,

    /// The presented token did not match
    #[error("Invalid authentication token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!("Authentication failed: {}", self);
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

/// Pull the token from the Authorization header or the query string.
fn extract_token(request: &Request) -> Result<String, AuthError> {
    if let Some(header) = request.headers().get("authorization") {
        let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        return value
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .ok_or(AuthError::InvalidAuthHeader);
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                return Ok(value.to_string());
            }
        }
    }

    Err(AuthError::MissingToken)
}

/// Validate the shared bearer token, when one is configured.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = state.config.auth.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = extract_token(&request)?;
    if token.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(next.run(request).await)
    } else {
        Err(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_bearer_header() {
        let token = extract_token(&request("/ws", Some("Bearer abc"))).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_extract_query_token() {
        let token = extract_token(&request("/ws?token=xyz", None)).unwrap();
        assert_eq!(token, "xyz");
    }

    #[test]
    fn test_header_wins_over_query() {
        let token = extract_token(&request("/ws?token=query", Some("Bearer header"))).unwrap();
        assert_eq!(token, "header");
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            extract_token(&request("/ws", None)),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn test_non_bearer_header_rejected() {
        assert!(matches!(
            extract_token(&request("/ws", Some("Basic abc"))),
            Err(AuthError::InvalidAuthHeader)
        ));
    }
}
