use axum::{
    routing::{get, post},
    Router,
};
use parley_core::config::ParleyConfig;
use parley_hub::{Hub, IdentityResolver};
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ParleyConfig,
    pub hub: Hub,
    pub resolver: Box<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(config: ParleyConfig, hub: Hub, resolver: Box<dyn IdentityResolver>) -> Self {
        Self {
            config,
            hub,
            resolver,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws/{token}", get(crate::ws::connection::ws_handler))
        .route("/websocket/{token}", get(crate::ws::connection::ws_handler))
        .route("/api/broadcast", post(crate::http::messages::broadcast))
        .route("/api/messages", post(crate::http::messages::multicast))
        .route(
            "/api/identities/{identity}/messages",
            post(crate::http::messages::unicast),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
