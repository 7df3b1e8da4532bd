//! Route assembly.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_check, voice::voice_ws_handler};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Build the application router.
///
/// `/ws` carries the voice sessions and is guarded by the bearer-token
/// middleware; `/health` stays open for probes. When a static directory is
/// configured it serves the browser frontend at the root.
pub fn create_router(state: Arc<AppState>) -> Router {
    let ws_routes = Router::new()
        .route("/ws", get(voice_ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(ws_routes);

    if let Some(static_dir) = &state.config.server.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    } else {
        router = router.route("/", get(health_check));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
