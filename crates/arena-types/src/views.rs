//! Per-audience projections of game state.
//!
//! A view is what one audience is allowed to see. Views are computed on
//! demand from the live state and never cached across mutations.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::UserId;

/// Who a view is being computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", content = "user", rename_all = "lowercase")]
pub enum Audience {
    /// Spectators and the per-session public channel.
    Public,
    /// One specific player on the roster.
    Player(UserId),
}

/// View of a subtraction-game session. Nothing is hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct NimView {
    /// Objects left on the table.
    pub remaining: u32,
    /// Roster index of the player whose turn it is.
    pub next_player: u32,
}

/// One roster slot in a guessing-game view.
///
/// Serializes untagged: `false` (not guessed), `true` (guessed, value
/// hidden), or the numeric guess itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(untagged)]
pub enum GuessSlot {
    /// Whether the player has guessed; the value is masked.
    Masked(bool),
    /// The player's numeric guess, visible to this audience.
    Revealed(u32),
}

/// View of a guessing-game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GuessView {
    /// The secret, present only once every player has guessed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub secret: Option<u32>,
    /// One slot per roster entry, in roster order.
    pub guesses: Vec<GuessSlot>,
}

/// A view tagged with the game it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "view", rename_all = "lowercase")]
pub enum GameView {
    /// Subtraction-game view.
    Nim(NimView),
    /// Guessing-game view.
    Guess(GuessView),
}
