//! REST API endpoint handlers for the Arena server.
//!
//! Every handler reads or creates sessions through the shared
//! [`SessionStore`](arena_session::SessionStore). Joining, starting, and
//! moving happen over the `WebSocket` channel (see [`crate::ws`]).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Plain-text banner |
//! | `POST` | `/api/game/create` | Create a session |
//! | `GET` | `/api/game/list` | All sessions, newest first |
//! | `GET` | `/api/game/{id}` | One session |
//! | `POST` | `/api/game/{id}/history` | Full move history (players only) |
//! | `POST` | `/api/game/{id}/history/{index}` | One history entry (players only) |
//! | `POST` | `/api/game/{id}/replay` | Replayed views (players only) |

use std::sync::Arc;

use arena_session::SessionError;
use arena_types::{GameKey, GameView, HistoryEntry, SessionId, SessionInfo};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::Credentials;
use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// A request carrying credentials and a payload.
#[derive(Debug, Deserialize)]
pub struct Authed<T> {
    /// Caller's credentials.
    pub auth: Credentials,
    /// Request-specific payload.
    pub payload: T,
}

/// A request carrying only credentials. Any other field is ignored.
#[derive(Debug, Deserialize)]
pub struct AuthOnly {
    /// Caller's credentials.
    pub auth: Credentials,
}

/// Parse a session ID from a path segment.
///
/// # Errors
///
/// [`ApiError::Malformed`] if `raw` is not a UUID.
pub fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Malformed(format!("invalid game id {raw:?}: {e}")))
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

/// Plain-text banner naming the server and its games.
pub async fn index(State(state): State<Arc<AppState>>) -> String {
    let games: Vec<&str> = state.store.registry().keys().map(GameKey::as_str).collect();
    format!("Arena game server\ngames: {}\n", games.join(", "))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Create a session with the caller as its only player.
///
/// # Route
///
/// `POST /api/game/create` with `{"auth": {...}, "payload": "<game type>"}`
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Authed<String>>, JsonRejection>,
) -> Result<Json<SessionInfo>, ApiError> {
    let Json(body) = body?;
    let game = body
        .payload
        .parse::<GameKey>()
        .map_err(|e| SessionError::UnknownGameType(e.0))?;
    let user = state.authenticate(&body.auth)?;

    let info = state.store.create(user, game, Utc::now()).await?;
    Ok(Json(info))
}

/// Every session, newest first.
///
/// # Route
///
/// `GET /api/game/list`
pub async fn list_games(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.store.list().await)
}

/// One session by ID. A malformed ID is reported as not found.
///
/// # Route
///
/// `GET /api/game/{id}`
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let Ok(id) = id.parse::<SessionId>() else {
        return Err(ApiError::GameNotFound);
    };
    Ok(Json(state.store.get(id).await?))
}

// ---------------------------------------------------------------------------
// History and replay
// ---------------------------------------------------------------------------

/// The full move history of a session.
///
/// # Route
///
/// `POST /api/game/{id}/history` with `{"auth": {...}}`
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<AuthOnly>, JsonRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Json(body) = body?;
    let id = parse_session_id(&id)?;
    let user = state.authenticate(&body.auth)?;

    Ok(Json(state.store.history(id, user.id).await?))
}

/// One history entry. Negative indices are out of bounds.
///
/// # Route
///
/// `POST /api/game/{id}/history/{index}` with `{"auth": {...}}`
pub async fn get_history_at(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, String)>,
    body: Result<Json<AuthOnly>, JsonRejection>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let Json(body) = body?;
    let id = parse_session_id(&id)?;
    let index: i64 = index
        .parse()
        .map_err(|e| ApiError::Malformed(format!("invalid history index {index:?}: {e}")))?;
    let user = state.authenticate(&body.auth)?;

    Ok(Json(state.store.history_at(id, index, user.id).await?))
}

/// The views the caller saw after each move, rebuilt from history.
///
/// # Route
///
/// `POST /api/game/{id}/replay` with `{"auth": {...}}`
pub async fn get_replay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<AuthOnly>, JsonRejection>,
) -> Result<Json<Vec<GameView>>, ApiError> {
    let Json(body) = body?;
    let id = parse_session_id(&id)?;
    let user = state.authenticate(&body.auth)?;

    Ok(Json(state.store.replay(id, user.id).await?))
}
