//! Axum router construction for the Arena API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin browser clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Arena server.
///
/// The router includes:
/// - `GET /` -- plain-text banner
/// - `GET /ws` -- `WebSocket` game channel
/// - `POST /api/game/create` -- create a session
/// - `GET /api/game/list` -- list sessions, newest first
/// - `GET /api/game/{id}` -- single session
/// - `POST /api/game/{id}/history` -- full move history
/// - `POST /api/game/{id}/history/{index}` -- single history entry
/// - `POST /api/game/{id}/replay` -- replayed views
///
/// CORS allows any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws", get(ws::ws_game))
        // REST API
        .route("/api/game/create", post(handlers::create_game))
        .route("/api/game/list", get(handlers::list_games))
        .route("/api/game/{id}", get(handlers::get_game))
        .route("/api/game/{id}/history", post(handlers::get_history))
        .route("/api/game/{id}/history/{index}", post(handlers::get_history_at))
        .route("/api/game/{id}/replay", post(handlers::get_replay))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
