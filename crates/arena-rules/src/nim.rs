//! The subtraction game.
//!
//! Two players alternate taking one to three objects from a shared pile.
//! The game ends when the pile is empty. There is no hidden information,
//! so the public and player views are identical.

use arena_types::{GameKey, GameView, NimView, UserId};

use crate::{GameMove, GameRule, GameState, RuleError, parse_bounded_int};

/// Default pile size at the start of play.
pub const DEFAULT_STARTING_OBJECTS: u32 = 21;

/// Smallest legal take.
const MIN_TAKE: u32 = 1;

/// Largest legal take.
const MAX_TAKE: u32 = 3;

/// Exactly two players take turns.
const PLAYERS: usize = 2;

/// Internal subtraction-game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NimState {
    /// Objects left on the pile.
    pub remaining: u32,
    /// Roster index of the player to move.
    pub turn_index: u32,
}

/// Rule implementation for the subtraction game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nim {
    starting_objects: u32,
}

impl Nim {
    /// Create a rule that starts with `starting_objects` on the pile.
    ///
    /// An empty pile is raised to one object so every started game has a
    /// legal first move.
    pub const fn new(starting_objects: u32) -> Self {
        let starting_objects = if starting_objects < MIN_TAKE {
            MIN_TAKE
        } else {
            starting_objects
        };
        Self { starting_objects }
    }

    fn state(state: &GameState) -> Result<&NimState, RuleError> {
        match state {
            GameState::Nim(s) => Ok(s),
            GameState::Guess(_) => Err(RuleError::StateMismatch {
                expected: GameKey::Nim,
            }),
        }
    }

    fn take(mv: GameMove) -> Result<u32, RuleError> {
        match mv {
            GameMove::Nim(n) => Ok(n),
            GameMove::Guess(_) => Err(RuleError::StateMismatch {
                expected: GameKey::Nim,
            }),
        }
    }

    fn project(state: &GameState) -> Result<GameView, RuleError> {
        let s = Self::state(state)?;
        Ok(GameView::Nim(NimView {
            remaining: s.remaining,
            next_player: s.turn_index,
        }))
    }
}

impl Default for Nim {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_OBJECTS)
    }
}

impl GameRule for Nim {
    fn key(&self) -> GameKey {
        GameKey::Nim
    }

    fn min_players(&self) -> usize {
        PLAYERS
    }

    fn max_players(&self) -> usize {
        PLAYERS
    }

    fn initial_state(&self, _players: &[UserId], _seed: u64) -> GameState {
        GameState::Nim(NimState {
            remaining: self.starting_objects,
            turn_index: 0,
        })
    }

    fn parse_move(&self, payload: &serde_json::Value) -> Result<GameMove, RuleError> {
        parse_bounded_int(payload, MIN_TAKE, MAX_TAKE).map(GameMove::Nim)
    }

    fn validate_move(
        &self,
        state: &GameState,
        players: &[UserId],
        mover: UserId,
        mv: GameMove,
    ) -> Result<(), RuleError> {
        let s = Self::state(state)?;
        let take = Self::take(mv)?;

        let to_move = usize::try_from(s.turn_index)
            .ok()
            .and_then(|i| players.get(i));
        if to_move != Some(&mover) {
            return Err(RuleError::illegal("not your turn"));
        }
        if !(MIN_TAKE..=MAX_TAKE).contains(&take) {
            return Err(RuleError::illegal(format!(
                "must take between {MIN_TAKE} and {MAX_TAKE} objects"
            )));
        }
        if take > s.remaining {
            return Err(RuleError::illegal(format!(
                "cannot take {take}, only {} remain",
                s.remaining
            )));
        }
        Ok(())
    }

    fn apply_move(
        &self,
        state: &GameState,
        players: &[UserId],
        mover: UserId,
        mv: GameMove,
    ) -> Result<GameState, RuleError> {
        self.validate_move(state, players, mover, mv)?;
        let s = Self::state(state)?;
        let take = Self::take(mv)?;

        let player_count = u32::try_from(players.len()).unwrap_or(u32::MAX);
        Ok(GameState::Nim(NimState {
            remaining: s.remaining.saturating_sub(take),
            turn_index: s.turn_index.saturating_add(1).checked_rem(player_count).unwrap_or(0),
        }))
    }

    fn is_terminal(&self, state: &GameState) -> Result<bool, RuleError> {
        Ok(Self::state(state)?.remaining == 0)
    }

    fn public_view(&self, state: &GameState, _players: &[UserId]) -> Result<GameView, RuleError> {
        Self::project(state)
    }

    fn player_view(
        &self,
        state: &GameState,
        _players: &[UserId],
        _viewer: UserId,
    ) -> Result<GameView, RuleError> {
        Self::project(state)
    }
}
