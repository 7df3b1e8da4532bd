//! HTTP request handlers.

pub mod voice;

use axum::Json;
use serde_json::{Value, json};

/// Liveness probe.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_shape() {
        let Json(body) = health_check().await;
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }
}
