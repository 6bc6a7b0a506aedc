use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::{middleware, Router};

use collab_core::config::CollabConfig;
use collab_sessions::SessionManager;

/// Central shared state, passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: CollabConfig,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: CollabConfig, sessions: SessionManager) -> Self {
        Self { config, sessions }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/sessions/create",
            post(crate::http::sessions::create_session),
        )
        .route(
            "/chat/sessions/create",
            post(crate::http::sessions::create_session),
        )
        .route("/chat/{sid}/stream", get(crate::http::sessions::stream))
        .route("/chat/{sid}/status", get(crate::http::sessions::status))
        .route(
            "/chat/{sid}/synapse-events",
            get(crate::http::sessions::synapse_events),
        )
        .route("/sessions/", get(crate::http::sessions::list_sessions))
        .route("/sessions/{sid}", get(crate::http::sessions::session_detail))
        .route("/sessions/{sid}/end", put(crate::http::sessions::end_session))
        .route(
            "/panels/available-models",
            get(crate::http::panels::available_models),
        )
        .route("/panels/presets", get(crate::http::panels::presets))
        .route("/panels/validate", post(crate::http::panels::validate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
