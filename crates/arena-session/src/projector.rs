//! Per-audience view projection.
//!
//! Given raw state and an audience, produce the masked view that audience
//! may see. All masking decisions belong to the game's rule; this module
//! only picks which projection applies and collects the full set of views
//! a state change has to be announced with.

use arena_rules::{GameRule, GameState, RuleError};
use arena_types::{Audience, GameView, UserId};

/// Project `state` for `audience`.
///
/// A player audience that is not on the roster gets the public view, so a
/// spectator can never obtain a player's private projection.
///
/// # Errors
///
/// Returns [`RuleError::StateMismatch`] if `state` belongs to another game.
pub fn project(
    rule: &dyn GameRule,
    state: &GameState,
    players: &[UserId],
    audience: Audience,
) -> Result<GameView, RuleError> {
    match audience {
        Audience::Player(viewer) if players.contains(&viewer) => {
            rule.player_view(state, players, viewer)
        }
        Audience::Player(_) | Audience::Public => rule.public_view(state, players),
    }
}

/// One player's private view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    /// The player the view is for.
    pub player: UserId,
    /// What that player may see.
    pub view: GameView,
}

/// Every view that must be delivered after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewUpdates {
    /// The view for the public channel.
    pub public: GameView,
    /// One private view per roster entry, in roster order.
    pub players: Vec<PlayerView>,
}

impl ViewUpdates {
    /// Compute the public view and one private view per player.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StateMismatch`] if `state` belongs to another game.
    pub fn compute(
        rule: &dyn GameRule,
        state: &GameState,
        players: &[UserId],
    ) -> Result<Self, RuleError> {
        let public = project(rule, state, players, Audience::Public)?;
        let players = players
            .iter()
            .map(|&player| {
                project(rule, state, players, Audience::Player(player))
                    .map(|view| PlayerView { player, view })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { public, players })
    }

    /// The private view computed for `player`, if they are on the roster.
    pub fn for_player(&self, player: UserId) -> Option<&GameView> {
        self.players
            .iter()
            .find(|pv| pv.player == player)
            .map(|pv| &pv.view)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arena_rules::{GameMove, Guess};
    use arena_types::GuessSlot;

    use super::*;

    #[test]
    fn non_player_audience_falls_back_to_public() {
        let rule = Guess::default();
        let players = vec![UserId::new(), UserId::new()];
        let state = rule.initial_state(&players, 1);
        let state = rule
            .apply_move(&state, &players, players[0], GameMove::Guess(40))
            .unwrap();

        let outsider = project(&rule, &state, &players, Audience::Player(UserId::new())).unwrap();
        let public = project(&rule, &state, &players, Audience::Public).unwrap();
        assert_eq!(outsider, public);
    }

    #[test]
    fn updates_carry_one_private_view_per_player() {
        let rule = Guess::default();
        let players = vec![UserId::new(), UserId::new()];
        let state = rule.initial_state(&players, 1);
        let state = rule
            .apply_move(&state, &players, players[1], GameMove::Guess(60))
            .unwrap();

        let updates = ViewUpdates::compute(&rule, &state, &players).unwrap();
        assert_eq!(updates.players.len(), 2);

        let GameView::Guess(own) = updates.for_player(players[1]).unwrap() else {
            panic!("expected a guess view");
        };
        assert_eq!(own.guesses[1], GuessSlot::Revealed(60));

        let GameView::Guess(other) = updates.for_player(players[0]).unwrap() else {
            panic!("expected a guess view");
        };
        assert_eq!(other.guesses[1], GuessSlot::Masked(true));
    }
}
