//! The game session state machine.
//!
//! A [`GameSession`] owns its roster, game state, and history. Every
//! mutation validates completely before writing anything, so a rejected
//! request leaves the session exactly as it was.
//!
//! # Lifecycle
//!
//! ```text
//! waiting --join (roster full) / start--> active --move (terminal)--> done
//! ```
//!
//! The roster only grows while waiting and is frozen afterwards.

use std::sync::Arc;

use arena_rules::{GameRule, GameState};
use arena_types::{
    Audience, ChatId, GameKey, GameView, HistoryEntry, PlayInfo, SessionId, SessionInfo,
    SessionStatus, UserId, UserInfo,
};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::SessionError;
use crate::history::HistoryLog;
use crate::projector::{ViewUpdates, project};
use crate::replay::{ReplaySource, build_replay};

/// State that exists only once play has begun.
#[derive(Debug, Clone)]
struct Play {
    /// Seed the initial state was drawn from. Kept for replay.
    seed: u64,
    /// Current game state, possibly holding hidden values.
    state: GameState,
}

/// One live game room.
pub struct GameSession {
    id: SessionId,
    rule: Arc<dyn GameRule>,
    status: SessionStatus,
    chat: ChatId,
    players: Vec<UserInfo>,
    created_at: DateTime<Utc>,
    created_by: UserInfo,
    play: Option<Play>,
    history: HistoryLog,
}

impl GameSession {
    /// Open a new waiting session whose roster holds only its creator.
    pub fn new(creator: UserInfo, rule: Arc<dyn GameRule>, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            rule,
            status: SessionStatus::Waiting,
            chat: ChatId::new(),
            players: vec![creator.clone()],
            created_at: now,
            created_by: creator,
            play: None,
            history: HistoryLog::new(),
        }
    }

    /// Session identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Which game this session plays.
    pub fn game(&self) -> GameKey {
        self.rule.key()
    }

    /// Current lifecycle phase.
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Creation timestamp.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The roster in join order.
    pub fn players(&self) -> &[UserInfo] {
        &self.players
    }

    /// Roster identities in join order.
    pub fn player_ids(&self) -> Vec<UserId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Whether `user` is on the roster.
    pub fn is_player(&self, user: UserId) -> bool {
        self.players.iter().any(|p| p.id == user)
    }

    /// Number of accepted moves.
    pub const fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Summary record for listings and lookups.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            game: self.game(),
            status: self.status,
            chat: self.chat,
            players: self.players.clone(),
            created_at: self.created_at,
            created_by: self.created_by.clone(),
            min_players: u32::try_from(self.rule.min_players()).unwrap_or(u32::MAX),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add `user` to the roster.
    ///
    /// When the roster reaches the game's maximum the session starts on its
    /// own, drawing its initial state from `seed`; the views of that start
    /// are returned.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] unless waiting,
    /// [`SessionError::AlreadyJoined`] if `user` is on the roster.
    pub fn join(&mut self, user: UserInfo, seed: u64) -> Result<Option<ViewUpdates>, SessionError> {
        self.require_status("join", SessionStatus::Waiting)?;
        if self.is_player(user.id) {
            return Err(SessionError::AlreadyJoined);
        }

        info!(session = %self.id, user = %user.username, "player joined");
        self.players.push(user);

        if self.players.len() >= self.rule.max_players() {
            return self.begin(seed).map(Some);
        }
        Ok(None)
    }

    /// Start play at a player's request.
    ///
    /// Any randomness the game needs is derived from `seed`, exactly once.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] unless waiting,
    /// [`SessionError::NotAPlayer`] if `requester` is not on the roster,
    /// [`SessionError::NotEnoughPlayers`] below the game's minimum.
    pub fn start(&mut self, requester: UserId, seed: u64) -> Result<ViewUpdates, SessionError> {
        self.require_status("start", SessionStatus::Waiting)?;
        if !self.is_player(requester) {
            return Err(SessionError::NotAPlayer);
        }
        let need = self.rule.min_players();
        if self.players.len() < need {
            return Err(SessionError::NotEnoughPlayers {
                have: self.players.len(),
                need,
            });
        }
        self.begin(seed)
    }

    /// Apply one move, record it, and finish the game if it is now over.
    ///
    /// The new state, the history entry, and any status change are
    /// committed together only after the rule has accepted the move.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] unless active,
    /// [`SessionError::NotAPlayer`] if `mover` is not on the roster,
    /// [`SessionError::IllegalMove`] if the rule rejects the move.
    pub fn apply_move(
        &mut self,
        mover: UserId,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<ViewUpdates, SessionError> {
        self.require_status("make a move in", SessionStatus::Active)?;
        if !self.is_player(mover) {
            return Err(SessionError::NotAPlayer);
        }
        let players = self.player_ids();
        let play = self.play.as_ref().ok_or_else(|| missing_play(self.id))?;

        let mv = self.rule.parse_move(payload)?;
        let next = self.rule.apply_move(&play.state, &players, mover, mv)?;
        let terminal = self.rule.is_terminal(&next)?;
        let updates = ViewUpdates::compute(self.rule.as_ref(), &next, &players)?;

        // Commit.
        self.history.append(mover, mv.to_payload(), now)?;
        if let Some(play) = self.play.as_mut() {
            play.state = next;
        }
        if terminal {
            self.status = SessionStatus::Done;
            info!(session = %self.id, moves = self.history.len(), "game finished");
        }
        Ok(updates)
    }

    fn begin(&mut self, seed: u64) -> Result<ViewUpdates, SessionError> {
        let players = self.player_ids();
        let state = self.rule.initial_state(&players, seed);
        let updates = ViewUpdates::compute(self.rule.as_ref(), &state, &players)?;

        self.play = Some(Play { seed, state });
        self.status = SessionStatus::Active;
        info!(session = %self.id, game = %self.game(), players = players.len(), "game started");
        Ok(updates)
    }

    fn require_status(
        &self,
        operation: &'static str,
        expected: SessionStatus,
    ) -> Result<(), SessionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// What `viewer` sees when loading the session.
    ///
    /// Anonymous viewers and viewers not on the roster get the public view.
    /// The view is `None` while the session is waiting.
    ///
    /// # Errors
    ///
    /// [`SessionError::Internal`] if the stored state does not match the game.
    pub fn view(&self, viewer: Option<UserId>) -> Result<PlayInfo, SessionError> {
        let is_player = viewer.is_some_and(|v| self.is_player(v));
        let audience = match viewer {
            Some(v) if is_player => Audience::Player(v),
            _ => Audience::Public,
        };
        Ok(PlayInfo {
            is_player,
            view: self.current_view(audience)?,
            players: self.players.clone(),
        })
    }

    /// The current projection for `audience`, or `None` before play.
    ///
    /// # Errors
    ///
    /// [`SessionError::Internal`] if the stored state does not match the game.
    pub fn current_view(&self, audience: Audience) -> Result<Option<GameView>, SessionError> {
        let Some(play) = &self.play else {
            return Ok(None);
        };
        let view = project(self.rule.as_ref(), &play.state, &self.player_ids(), audience)?;
        Ok(Some(view))
    }

    /// The full move history. Players only.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAPlayer`] if `requester` is not on the roster.
    pub fn history(&self, requester: UserId) -> Result<&[HistoryEntry], SessionError> {
        self.require_player(requester)?;
        Ok(self.history.entries())
    }

    /// One history entry. Players only.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAPlayer`] if `requester` is not on the roster,
    /// [`SessionError::IndexOutOfBounds`] unless `0 <= index < len`.
    pub fn history_at(&self, requester: UserId, index: i64) -> Result<&HistoryEntry, SessionError> {
        self.require_player(requester)?;
        self.history.at(index)
    }

    /// Replay the history as `requester` would have seen it. Players only.
    ///
    /// Returns an empty sequence before play has started.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAPlayer`] if `requester` is not on the roster,
    /// [`SessionError::Internal`] if the history no longer replays.
    pub fn replay(&self, requester: UserId) -> Result<Vec<GameView>, SessionError> {
        self.require_player(requester)?;
        let Some(play) = &self.play else {
            return Ok(Vec::new());
        };
        let players = self.player_ids();
        build_replay(
            self.rule.as_ref(),
            ReplaySource {
                players: &players,
                seed: play.seed,
                history: self.history.entries(),
            },
            Audience::Player(requester),
        )
    }

    fn require_player(&self, user: UserId) -> Result<(), SessionError> {
        if self.is_player(user) {
            Ok(())
        } else {
            Err(SessionError::NotAPlayer)
        }
    }
}

impl core::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("game", &self.game())
            .field("status", &self.status)
            .field("players", &self.players.len())
            .field("moves", &self.history.len())
            .finish_non_exhaustive()
    }
}

fn missing_play(id: SessionId) -> SessionError {
    SessionError::Internal(format!("session {id} is active without game state"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arena_rules::{Guess, Nim};
    use arena_types::{GuessSlot, NimView};

    use super::*;

    fn user(name: &str) -> UserInfo {
        UserInfo {
            id: UserId::new(),
            username: name.to_owned(),
            display: name.to_owned(),
        }
    }

    fn nim_session() -> (GameSession, UserInfo, UserInfo) {
        let (a, b) = (user("user1"), user("user2"));
        let session = GameSession::new(a.clone(), Arc::new(Nim::default()), Utc::now());
        (session, a, b)
    }

    fn nim_view(session: &GameSession) -> NimView {
        match session.current_view(Audience::Public).unwrap() {
            Some(GameView::Nim(v)) => v,
            other => panic!("expected a nim view, got {other:?}"),
        }
    }

    #[test]
    fn new_session_waits_with_creator_on_roster() {
        let (session, a, _) = nim_session();
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.players(), &[a.clone()]);
        let info = session.info();
        assert_eq!(info.created_by, a);
        assert_eq!(info.min_players, 2);
        assert_eq!(session.view(None).unwrap().view, None);
    }

    #[test]
    fn filling_the_roster_starts_the_game() {
        let (mut session, _, b) = nim_session();
        let started = session.join(b, 0).unwrap();
        assert!(started.is_some());
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn joining_twice_is_rejected() {
        let (a, b, c) = (user("a"), user("b"), user("c"));
        let mut session = GameSession::new(a.clone(), Arc::new(Guess::default()), Utc::now());
        session.join(b, 0).unwrap();
        assert_eq!(session.join(a, 0), Err(SessionError::AlreadyJoined));
        session.join(c, 0).unwrap();
        assert_eq!(session.players().len(), 3);
    }

    #[test]
    fn start_requires_minimum_roster_and_membership() {
        let (mut session, a, _) = nim_session();
        assert_eq!(
            session.start(a.id, 0).unwrap_err(),
            SessionError::NotEnoughPlayers { have: 1, need: 2 }
        );
        assert_eq!(
            session.start(UserId::new(), 0).unwrap_err(),
            SessionError::NotAPlayer
        );
        assert_eq!(session.status(), SessionStatus::Waiting);
    }

    #[test]
    fn nim_scenario_from_twenty_one() {
        let (mut session, a, b) = nim_session();
        session.join(b.clone(), 0).unwrap();
        assert_eq!(nim_view(&session).remaining, 21);

        session.apply_move(a.id, &serde_json::json!(3), Utc::now()).unwrap();
        assert_eq!(nim_view(&session), NimView { remaining: 18, next_player: 1 });

        session.apply_move(b.id, &serde_json::json!(2), Utc::now()).unwrap();
        assert_eq!(nim_view(&session), NimView { remaining: 16, next_player: 0 });

        assert_eq!(session.history_len(), 2);
        assert_eq!(session.history_at(a.id, 0).unwrap().payload, serde_json::json!(3));
        assert_eq!(session.history_at(b.id, 0).unwrap().by, a.id);
    }

    #[test]
    fn moving_while_waiting_is_invalid_and_changes_nothing() {
        let (mut session, a, _) = nim_session();
        let result = session.apply_move(a.id, &serde_json::json!(1), Utc::now());
        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn illegal_move_leaves_state_untouched() {
        let (mut session, a, b) = nim_session();
        session.join(b.clone(), 0).unwrap();
        let before = nim_view(&session);

        let out_of_turn = session.apply_move(b.id, &serde_json::json!(1), Utc::now());
        assert!(matches!(out_of_turn, Err(SessionError::IllegalMove { .. })));
        let malformed = session.apply_move(a.id, &serde_json::json!("3"), Utc::now());
        assert!(matches!(malformed, Err(SessionError::IllegalMove { .. })));
        let outsider = session.apply_move(UserId::new(), &serde_json::json!(1), Utc::now());
        assert_eq!(outsider.unwrap_err(), SessionError::NotAPlayer);

        assert_eq!(nim_view(&session), before);
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn finished_game_rejects_joins_and_moves() {
        let (a, b) = (user("a"), user("b"));
        let mut session = GameSession::new(a.clone(), Arc::new(Nim::new(2)), Utc::now());
        session.join(b.clone(), 0).unwrap();
        session.apply_move(a.id, &serde_json::json!(2), Utc::now()).unwrap();
        assert_eq!(session.status(), SessionStatus::Done);

        let late = session.join(user("c"), 0);
        assert!(matches!(late, Err(SessionError::InvalidState { status: SessionStatus::Done, .. })));
        let extra = session.apply_move(b.id, &serde_json::json!(1), Utc::now());
        assert!(matches!(extra, Err(SessionError::InvalidState { .. })));
        assert_eq!(session.players().len(), 2);
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn zero_object_setting_still_plays_to_the_end() {
        let (a, b) = (user("a"), user("b"));
        let mut session = GameSession::new(a.clone(), Arc::new(Nim::new(0)), Utc::now());
        session.join(b, 0).unwrap();
        assert_eq!(session.status(), SessionStatus::Active);

        session.apply_move(a.id, &serde_json::json!(1), Utc::now()).unwrap();
        assert_eq!(session.status(), SessionStatus::Done);
    }

    #[test]
    fn guess_scenario_masks_then_reveals() {
        let (a, b) = (user("a"), user("b"));
        let mut session = GameSession::new(a.clone(), Arc::new(Guess::default()), Utc::now());
        session.join(b.clone(), 0).unwrap();
        session.start(a.id, 11).unwrap();

        session.apply_move(a.id, &serde_json::json!(40), Utc::now()).unwrap();
        let Some(GameView::Guess(seen_by_b)) = session.view(Some(b.id)).unwrap().view else {
            panic!("expected a guess view");
        };
        assert_eq!(seen_by_b.guesses, vec![GuessSlot::Masked(true), GuessSlot::Masked(false)]);

        session.apply_move(b.id, &serde_json::json!(60), Utc::now()).unwrap();
        assert_eq!(session.status(), SessionStatus::Done);
        for viewer in [Some(a.id), Some(b.id), None] {
            let Some(GameView::Guess(view)) = session.view(viewer).unwrap().view else {
                panic!("expected a guess view");
            };
            assert_eq!(view.guesses, vec![GuessSlot::Revealed(40), GuessSlot::Revealed(60)]);
            assert!(view.secret.is_some());
        }
    }

    #[test]
    fn history_is_for_players_only() {
        let (session, _, b) = nim_session();
        assert_eq!(session.history(b.id).unwrap_err(), SessionError::NotAPlayer);
        assert_eq!(session.replay(b.id).unwrap_err(), SessionError::NotAPlayer);
    }

    #[test]
    fn replay_ends_at_the_live_view() {
        let (a, b, c) = (user("a"), user("b"), user("c"));
        let mut session = GameSession::new(a.clone(), Arc::new(Guess::default()), Utc::now());
        session.join(b.clone(), 0).unwrap();
        session.join(c.clone(), 0).unwrap();
        session.start(b.id, 987_654).unwrap();
        session.apply_move(c.id, &serde_json::json!(5), Utc::now()).unwrap();
        session.apply_move(a.id, &serde_json::json!(95), Utc::now()).unwrap();

        for player in [&a, &b, &c] {
            let replay = session.replay(player.id).unwrap();
            assert_eq!(replay.len(), 2);
            let live = session.current_view(Audience::Player(player.id)).unwrap();
            assert_eq!(replay.last().cloned(), live);
        }

        session.apply_move(b.id, &serde_json::json!(50), Utc::now()).unwrap();
        let replay = session.replay(a.id).unwrap();
        let live = session.current_view(Audience::Player(a.id)).unwrap();
        assert_eq!(replay.last().cloned(), live);
    }
}
