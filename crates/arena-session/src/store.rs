//! Concurrent registry of live sessions.
//!
//! # Serialization
//!
//! Each session sits behind its own [`RwLock`]. `join`, `start`, and
//! `apply_move` take the write half, so mutations of one session are
//! applied strictly one after another and each is validated against the
//! state the previous one produced. Reads share the read half. Sessions
//! never lock each other, so work on different sessions runs in parallel.
//!
//! Notifications are handed to the caller's [`Fanout`] while the write lock
//! is still held, so subscribers observe updates in the order they were
//! applied.

use std::collections::BTreeMap;
use std::sync::Arc;

use arena_rules::RuleRegistry;
use arena_types::{
    GameKey, GameView, HistoryEntry, PlayInfo, SessionId, SessionInfo, UserId, UserInfo,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::SessionError;
use crate::fanout::Fanout;
use crate::projector::ViewUpdates;
use crate::session::GameSession;

/// All sessions known to this process.
#[derive(Debug)]
pub struct SessionStore {
    registry: RuleRegistry,
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<GameSession>>>>,
}

impl SessionStore {
    /// Create an empty store that plays the games in `registry`.
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// The games this store can create.
    pub const fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    async fn session(&self, id: SessionId) -> Result<Arc<RwLock<GameSession>>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Open a new session of `game` with `creator` as its only player.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownGameType`] if `game` has no registered rule.
    pub async fn create(
        &self,
        creator: UserInfo,
        game: GameKey,
        now: DateTime<Utc>,
    ) -> Result<SessionInfo, SessionError> {
        let rule = self
            .registry
            .get(game)
            .ok_or_else(|| SessionError::UnknownGameType(game.to_string()))?;
        let session = GameSession::new(creator, rule, now);
        let info = session.info();

        self.sessions
            .write()
            .await
            .insert(info.id, Arc::new(RwLock::new(session)));
        info!(session = %info.id, game = %game, creator = %info.created_by.username, "session created");
        Ok(info)
    }

    /// Add `user` to a waiting session, starting it if the roster is full.
    ///
    /// Publishes the new roster, then the starting views if the join
    /// started the game.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], or any error of [`GameSession::join`].
    pub async fn join(
        &self,
        id: SessionId,
        user: UserInfo,
        fanout: &dyn Fanout,
    ) -> Result<SessionInfo, SessionError> {
        let session = self.session(id).await?;
        let mut session = session.write().await;
        let started = session.join(user, rand::random())?;

        fanout.deliver_players(id, session.players());
        if let Some(updates) = &started {
            fanout.deliver_views(id, updates);
        }
        Ok(session.info())
    }

    /// Start a waiting session and publish its first views.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], or any error of [`GameSession::start`].
    pub async fn start(
        &self,
        id: SessionId,
        requester: UserId,
        fanout: &dyn Fanout,
    ) -> Result<ViewUpdates, SessionError> {
        let session = self.session(id).await?;
        let mut session = session.write().await;
        let updates = session.start(requester, rand::random())?;

        fanout.deliver_views(id, &updates);
        Ok(updates)
    }

    /// Apply a move and publish the resulting views.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], or any error of [`GameSession::apply_move`].
    pub async fn apply_move(
        &self,
        id: SessionId,
        mover: UserId,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
        fanout: &dyn Fanout,
    ) -> Result<ViewUpdates, SessionError> {
        let session = self.session(id).await?;
        let mut session = session.write().await;
        let updates = session.apply_move(mover, payload, now)?;

        fanout.deliver_views(id, &updates);
        Ok(updates)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Summary of one session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] if no such session exists.
    pub async fn get(&self, id: SessionId) -> Result<SessionInfo, SessionError> {
        Ok(self.session(id).await?.read().await.info())
    }

    /// Summaries of every session, newest first.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.read().await.info());
        }
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        infos
    }

    /// What `viewer` sees when loading a session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], or any error of [`GameSession::view`].
    pub async fn view(
        &self,
        id: SessionId,
        viewer: Option<UserId>,
    ) -> Result<PlayInfo, SessionError> {
        self.session(id).await?.read().await.view(viewer)
    }

    /// The full move history of a session. Players only.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] or [`SessionError::NotAPlayer`].
    pub async fn history(
        &self,
        id: SessionId,
        requester: UserId,
    ) -> Result<Vec<HistoryEntry>, SessionError> {
        let session = self.session(id).await?;
        let session = session.read().await;
        session.history(requester).map(<[HistoryEntry]>::to_vec)
    }

    /// One history entry of a session. Players only.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], [`SessionError::NotAPlayer`], or
    /// [`SessionError::IndexOutOfBounds`].
    pub async fn history_at(
        &self,
        id: SessionId,
        index: i64,
        requester: UserId,
    ) -> Result<HistoryEntry, SessionError> {
        let session = self.session(id).await?;
        let session = session.read().await;
        session.history_at(requester, index).cloned()
    }

    /// Replay a session's history as `requester` saw it. Players only.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`], or any error of [`GameSession::replay`].
    pub async fn replay(
        &self,
        id: SessionId,
        requester: UserId,
    ) -> Result<Vec<GameView>, SessionError> {
        self.session(id).await?.read().await.replay(requester)
    }
}
