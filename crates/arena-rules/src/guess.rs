//! The number-guessing game.
//!
//! Every player submits one guess between 1 and 100, in any order. A
//! secret is drawn when the session starts and stays hidden until the last
//! guess arrives, at which point it is revealed and the game ends.
//!
//! # Masking
//!
//! Before the reveal a player sees their own guess as a number and every
//! other slot as a has-guessed boolean. Spectators see booleans only.
//! After the reveal everyone sees every guess and the secret.

use std::collections::BTreeMap;

use arena_types::{GameKey, GameView, GuessSlot, GuessView, UserId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{GameMove, GameRule, GameState, RuleError, parse_bounded_int};

/// Lowest legal guess (and secret).
pub const MIN_GUESS: u32 = 1;

/// Highest legal guess (and secret).
pub const MAX_GUESS: u32 = 100;

/// Default roster size at which a guessing game starts on its own.
pub const DEFAULT_MAX_PLAYERS: usize = 10;

const MIN_PLAYERS: usize = 2;

/// Internal guessing-game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessState {
    /// Guesses received so far.
    pub guesses: BTreeMap<UserId, u32>,
    /// The secret drawn at start. Never projected before the reveal.
    pub hidden_secret: u32,
    /// The secret, once every player has guessed.
    pub secret: Option<u32>,
}

/// Rule implementation for the guessing game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guess {
    max_players: usize,
}

impl Guess {
    /// Create a rule that auto-starts once `max_players` have joined.
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players: max_players.max(MIN_PLAYERS),
        }
    }

    fn state(state: &GameState) -> Result<&GuessState, RuleError> {
        match state {
            GameState::Guess(s) => Ok(s),
            GameState::Nim(_) => Err(RuleError::StateMismatch {
                expected: GameKey::Guess,
            }),
        }
    }

    fn value(mv: GameMove) -> Result<u32, RuleError> {
        match mv {
            GameMove::Guess(n) => Ok(n),
            GameMove::Nim(_) => Err(RuleError::StateMismatch {
                expected: GameKey::Guess,
            }),
        }
    }

    /// Build the view, revealing the numeric guess of `viewer` only.
    fn project(state: &GameState, players: &[UserId], viewer: Option<UserId>) -> Result<GameView, RuleError> {
        let s = Self::state(state)?;
        let guesses = players
            .iter()
            .map(|player| match (s.guesses.get(player), s.secret) {
                (Some(&value), Some(_)) => GuessSlot::Revealed(value),
                (Some(&value), None) if viewer == Some(*player) => GuessSlot::Revealed(value),
                (guess, _) => GuessSlot::Masked(guess.is_some()),
            })
            .collect();
        Ok(GameView::Guess(GuessView {
            secret: s.secret,
            guesses,
        }))
    }
}

impl Default for Guess {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLAYERS)
    }
}

impl GameRule for Guess {
    fn key(&self) -> GameKey {
        GameKey::Guess
    }

    fn min_players(&self) -> usize {
        MIN_PLAYERS
    }

    fn max_players(&self) -> usize {
        self.max_players
    }

    fn initial_state(&self, _players: &[UserId], seed: u64) -> GameState {
        let mut rng = StdRng::seed_from_u64(seed);
        GameState::Guess(GuessState {
            guesses: BTreeMap::new(),
            hidden_secret: rng.random_range(MIN_GUESS..=MAX_GUESS),
            secret: None,
        })
    }

    fn parse_move(&self, payload: &serde_json::Value) -> Result<GameMove, RuleError> {
        parse_bounded_int(payload, MIN_GUESS, MAX_GUESS).map(GameMove::Guess)
    }

    fn validate_move(
        &self,
        state: &GameState,
        players: &[UserId],
        mover: UserId,
        mv: GameMove,
    ) -> Result<(), RuleError> {
        let s = Self::state(state)?;
        let value = Self::value(mv)?;

        if !players.contains(&mover) {
            return Err(RuleError::illegal("not a player in this game"));
        }
        if s.secret.is_some() {
            return Err(RuleError::illegal("the secret has already been revealed"));
        }
        if s.guesses.contains_key(&mover) {
            return Err(RuleError::illegal("already guessed"));
        }
        if !(MIN_GUESS..=MAX_GUESS).contains(&value) {
            return Err(RuleError::illegal(format!(
                "guess must be between {MIN_GUESS} and {MAX_GUESS}"
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
        let mut next = Self::state(state)?.clone();
        next.guesses.insert(mover, Self::value(mv)?);

        if players.iter().all(|p| next.guesses.contains_key(p)) {
            debug!(guesses = next.guesses.len(), "all players guessed, revealing secret");
            next.secret = Some(next.hidden_secret);
        }
        Ok(GameState::Guess(next))
    }

    fn is_terminal(&self, state: &GameState) -> Result<bool, RuleError> {
        Ok(Self::state(state)?.secret.is_some())
    }

    fn public_view(&self, state: &GameState, players: &[UserId]) -> Result<GameView, RuleError> {
        Self::project(state, players, None)
    }

    fn player_view(
        &self,
        state: &GameState,
        players: &[UserId],
        viewer: UserId,
    ) -> Result<GameView, RuleError> {
        Self::project(state, players, Some(viewer))
    }
}
