//! Replay of a session's history through its rule engine.
//!
//! Replay starts from the rule's initial state for the recorded roster and
//! seed, then applies every history entry with the same [`GameRule`] the
//! live session uses. Views are recomputed from scratch on every call and
//! the live session is never touched.

use arena_rules::GameRule;
use arena_types::{Audience, GameView, HistoryEntry, UserId};

use crate::error::SessionError;
use crate::projector::project;

/// Everything needed to reproduce a session's states.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySource<'a> {
    /// Roster at the time play started.
    pub players: &'a [UserId],
    /// Seed the initial state was drawn from.
    pub seed: u64,
    /// Accepted moves in order.
    pub history: &'a [HistoryEntry],
}

/// Rebuild the view `audience` would have seen after each recorded move.
///
/// The returned sequence has one view per history entry.
///
/// # Errors
///
/// Returns [`SessionError::Internal`] if a recorded move no longer
/// validates, which means the history and the rule engine disagree.
pub fn build_replay(
    rule: &dyn GameRule,
    source: ReplaySource<'_>,
    audience: Audience,
) -> Result<Vec<GameView>, SessionError> {
    let mut state = rule.initial_state(source.players, source.seed);
    let mut views = Vec::with_capacity(source.history.len());

    for entry in source.history {
        let diverged = |e: arena_rules::RuleError| {
            SessionError::Internal(format!("replay diverged at move {}: {e}", entry.index))
        };
        let mv = rule.parse_move(&entry.payload).map_err(diverged)?;
        state = rule
            .apply_move(&state, source.players, entry.by, mv)
            .map_err(diverged)?;
        views.push(project(rule, &state, source.players, audience).map_err(diverged)?);
    }

    Ok(views)
}
