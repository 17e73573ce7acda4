//! Error types for the session engine.
//!
//! Every variant except [`SessionError::Internal`] is an expected,
//! recoverable condition that callers surface to the client. Internal
//! errors mean an invariant broke and are logged rather than explained.

use arena_rules::RuleError;
use arena_types::{SessionId, SessionStatus};

/// Errors that can occur while operating on a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The requested game type has no registered rule.
    #[error("unknown game type: {0}")]
    UnknownGameType(String),

    /// No session exists with this ID.
    #[error("game not found")]
    NotFound(SessionId),

    /// The operation is not allowed in the session's current phase.
    #[error("cannot {operation} a game that is {status}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The phase the session was in.
        status: SessionStatus,
    },

    /// The user is already on the roster.
    #[error("already joined this game")]
    AlreadyJoined,

    /// The user is not on the roster.
    #[error("not a player in this game")]
    NotAPlayer,

    /// The roster is smaller than the game's minimum.
    #[error("not enough players: need {need}, have {have}")]
    NotEnoughPlayers {
        /// Current roster size.
        have: usize,
        /// Minimum roster size.
        need: usize,
    },

    /// The move failed schema validation or broke a game rule.
    #[error("illegal move: {reason}")]
    IllegalMove {
        /// Why the move was rejected.
        reason: String,
    },

    /// A history index outside `0..len` was requested.
    #[error("history index out of bounds")]
    IndexOutOfBounds {
        /// The requested index.
        index: i64,
        /// The history length at the time of the request.
        len: usize,
    },

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RuleError> for SessionError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Malformed { reason } | RuleError::Illegal { reason } => {
                Self::IllegalMove { reason }
            }
            RuleError::StateMismatch { .. } => Self::Internal(err.to_string()),
        }
    }
}
