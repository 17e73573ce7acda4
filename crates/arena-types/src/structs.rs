//! Core records exchanged between the session engine and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{GameKey, SessionStatus};
use crate::ids::{ChatId, SessionId, UserId};
use crate::views::GameView;

/// Public profile of an authenticated user. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserInfo {
    /// Stable identity.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Display name.
    pub display: String,
}

/// Summary of a session, as served by the session list and lookup routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session identifier.
    pub id: SessionId,
    /// Which game is played.
    #[serde(rename = "type")]
    pub game: GameKey,
    /// Lifecycle phase.
    pub status: SessionStatus,
    /// Chat channel attached to the session.
    pub chat: ChatId,
    /// Roster in join order.
    pub players: Vec<UserInfo>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Who created the session.
    pub created_by: UserInfo,
    /// Roster size needed before the session may start.
    pub min_players: u32,
}

/// What one viewer sees when loading a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PlayInfo {
    /// Whether the viewer is on the roster.
    pub is_player: bool,
    /// `None` while the session is waiting for players.
    pub view: Option<GameView>,
    /// Roster in join order.
    pub players: Vec<UserInfo>,
}

/// One accepted move in a session's history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryEntry {
    /// Zero-based position in the log.
    pub index: u32,
    /// The player who made the move.
    pub by: UserId,
    /// The validated move payload.
    #[serde(rename = "move")]
    pub payload: serde_json::Value,
    /// When the move was accepted.
    pub when: DateTime<Utc>,
}
