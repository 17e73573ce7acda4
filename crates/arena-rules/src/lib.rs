//! Pure turn-based rule engines for the Arena game session engine.
//!
//! Each registered game type implements [`GameRule`]: initial state, move
//! parsing and validation, the state transition, the terminal check, and
//! per-audience view projection. Rule engines own no data. They are pure
//! over `(state, players, move, mover) -> new state | error`, which is what
//! lets the replay builder reproduce live state exactly.
//!
//! # Modules
//!
//! - [`nim`] -- The subtraction game
//! - [`guess`] -- The number-guessing game with a hidden secret
//! - [`registry`] -- Lookup from [`GameKey`] to its rule implementation

pub mod guess;
pub mod nim;
pub mod registry;

pub use guess::{Guess, GuessState};
pub use nim::{Nim, NimState};
pub use registry::{RuleRegistry, RuleSettings};

use arena_types::{GameKey, GameView, UserId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by rule engines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The move payload does not match the game's move schema.
    #[error("malformed move: {reason}")]
    Malformed {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The move is well-formed but not allowed in the current state.
    #[error("illegal move: {reason}")]
    Illegal {
        /// Which rule the move broke.
        reason: String,
    },

    /// A state or move belonging to another game was handed to this rule.
    #[error("state does not belong to game {expected}")]
    StateMismatch {
        /// The game whose rule received the foreign value.
        expected: GameKey,
    },
}

impl RuleError {
    pub(crate) fn illegal(reason: impl Into<String>) -> Self {
        Self::Illegal {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// State and moves
// ---------------------------------------------------------------------------

/// Internal game state, tagged by game. May contain hidden information.
///
/// Has no wire form. Clients only ever receive projected views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameState {
    /// Subtraction-game state.
    Nim(NimState),
    /// Guessing-game state.
    Guess(GuessState),
}

/// A parsed, schema-valid move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMove {
    /// Number of objects to take.
    Nim(u32),
    /// The guessed number.
    Guess(u32),
}

impl GameMove {
    /// Canonical JSON payload recorded in the history log.
    pub fn to_payload(self) -> serde_json::Value {
        match self {
            Self::Nim(n) | Self::Guess(n) => serde_json::Value::from(n),
        }
    }
}

/// Parse an integer within `[min, max]` from a JSON payload.
///
/// Only integral JSON numbers are accepted; strings such as `"55"` and
/// fractional numbers are rejected.
pub(crate) fn parse_bounded_int(
    payload: &serde_json::Value,
    min: u32,
    max: u32,
) -> Result<u32, RuleError> {
    let value = payload
        .as_i64()
        .ok_or_else(|| RuleError::malformed(format!("expected an integer, got {payload}")))?;

    let value = u32::try_from(value)
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| {
            RuleError::malformed(format!("expected an integer in [{min}, {max}], got {value}"))
        })?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// The rule trait
// ---------------------------------------------------------------------------

/// The capability set every registered game type implements.
///
/// Implementations never look at roster membership beyond the `players`
/// slice they are given, and never mutate their inputs.
pub trait GameRule: Send + Sync {
    /// The key this rule is registered under.
    fn key(&self) -> GameKey;

    /// Roster size required before the session may start.
    fn min_players(&self) -> usize;

    /// Roster size at which the session starts automatically.
    fn max_players(&self) -> usize;

    /// State at the beginning of play.
    ///
    /// Any randomness is derived from `seed`, so the same seed always
    /// produces the same state.
    fn initial_state(&self, players: &[UserId], seed: u64) -> GameState;

    /// Validate a raw payload against this game's move schema.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Malformed`] if the payload has the wrong shape.
    fn parse_move(&self, payload: &serde_json::Value) -> Result<GameMove, RuleError>;

    /// Check whether `mover` may make `mv` in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Illegal`] when a game rule forbids the move.
    fn validate_move(
        &self,
        state: &GameState,
        players: &[UserId],
        mover: UserId,
        mv: GameMove,
    ) -> Result<(), RuleError>;

    /// Produce the state that follows an accepted move.
    ///
    /// Validates first, so callers cannot apply an illegal move.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`validate_move`](GameRule::validate_move).
    fn apply_move(
        &self,
        state: &GameState,
        players: &[UserId],
        mover: UserId,
        mv: GameMove,
    ) -> Result<GameState, RuleError>;

    /// Whether `state` ends the game.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StateMismatch`] for another game's state.
    fn is_terminal(&self, state: &GameState) -> Result<bool, RuleError>;

    /// What spectators see.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StateMismatch`] for another game's state.
    fn public_view(&self, state: &GameState, players: &[UserId]) -> Result<GameView, RuleError>;

    /// What one player sees.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StateMismatch`] for another game's state.
    fn player_view(
        &self,
        state: &GameState,
        players: &[UserId],
        viewer: UserId,
    ) -> Result<GameView, RuleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_whole_numbers_in_range() {
        assert_eq!(parse_bounded_int(&serde_json::json!(1), 1, 3), Ok(1));
        assert_eq!(parse_bounded_int(&serde_json::json!(3), 1, 3), Ok(3));
    }

    #[test]
    fn parse_rejects_out_of_range_and_wrong_shapes() {
        for bad in [
            serde_json::json!(0),
            serde_json::json!(4),
            serde_json::json!(-4),
            serde_json::json!(2.5),
            serde_json::json!("2"),
            serde_json::json!(null),
        ] {
            assert!(
                matches!(parse_bounded_int(&bad, 1, 3), Err(RuleError::Malformed { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
