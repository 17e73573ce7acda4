//! Lookup from [`GameKey`] to the rule that implements it.
//!
//! The session engine never branches on game type. It asks the registry
//! for the rule stored under the session's key and calls through the
//! [`GameRule`] trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use arena_types::GameKey;

use crate::guess::{self, Guess};
use crate::nim::{self, Nim};
use crate::GameRule;

/// Tunables for the built-in games.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSettings {
    /// Pile size at the start of a subtraction game.
    pub nim_starting_objects: u32,
    /// Roster size at which a guessing game starts on its own.
    pub guess_max_players: usize,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            nim_starting_objects: nim::DEFAULT_STARTING_OBJECTS,
            guess_max_players: guess::DEFAULT_MAX_PLAYERS,
        }
    }
}

/// The set of registered game rules.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<GameKey, Arc<dyn GameRule>>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in game.
    pub fn standard(settings: &RuleSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Nim::new(settings.nim_starting_objects)));
        registry.register(Arc::new(Guess::new(settings.guess_max_players)));
        registry
    }

    /// Register `rule` under its own key, replacing any previous rule.
    pub fn register(&mut self, rule: Arc<dyn GameRule>) {
        self.rules.insert(rule.key(), rule);
    }

    /// The rule registered for `key`, if any.
    pub fn get(&self, key: GameKey) -> Option<Arc<dyn GameRule>> {
        self.rules.get(&key).cloned()
    }

    /// Keys with a registered rule.
    pub fn keys(&self) -> impl Iterator<Item = GameKey> + '_ {
        self.rules.keys().copied()
    }
}

impl core::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("keys", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}
