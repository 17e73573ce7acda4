//! Enumeration types shared by the rule engine, session engine, and server.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Selects which game a session plays.
///
/// The set is closed: every key has exactly one rule implementation in
/// `arena-rules`. Keys serialize as lowercase strings (`"nim"`, `"guess"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum GameKey {
    /// The subtraction game: take 1-3 objects, last to take wins.
    Nim,
    /// The guessing game: everyone guesses 1-100, closest to the secret wins.
    Guess,
}

impl GameKey {
    /// All known game keys, in display order.
    pub const ALL: [Self; 2] = [Self::Nim, Self::Guess];

    /// The wire name of this key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nim => "nim",
            Self::Guess => "guess",
        }
    }
}

impl core::fmt::Display for GameKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGameKey(pub String);

impl core::fmt::Display for UnknownGameKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown game type: {}", self.0)
    }
}

impl std::error::Error for UnknownGameKey {}

impl core::str::FromStr for GameKey {
    type Err = UnknownGameKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownGameKey(s.to_owned()))
    }
}

/// Lifecycle phase of a game session.
///
/// Transitions are one-directional: `Waiting -> Active -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting players; no game state yet.
    Waiting,
    /// Game in progress; the roster is frozen.
    Active,
    /// Terminal condition reached; no further joins or moves.
    Done,
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}
