//! Routing of session notifications to their audiences.
//!
//! Each session has one public topic (spectators and players) and one
//! private topic per player. The fanout only decides where an event goes;
//! what goes out is computed by the session state machine.
//!
//! [`ChannelFanout`] backs topics with [`tokio::sync::broadcast`] channels.
//! If a subscriber falls behind by more than [`TOPIC_CAPACITY`] events it
//! receives [`broadcast::error::RecvError::Lagged`] and skips ahead.

use std::collections::HashMap;
use std::sync::Mutex;

use arena_types::{GameView, SessionId, UserId, UserInfo};
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::projector::ViewUpdates;

/// Capacity of each topic's broadcast channel.
pub const TOPIC_CAPACITY: usize = 64;

/// A delivery target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Everyone watching the session.
    Public(SessionId),
    /// One player of the session.
    Private(SessionId, UserId),
}

/// A notification about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The roster changed.
    PlayersUpdated {
        /// The session.
        id: SessionId,
        /// The roster in join order.
        players: Vec<UserInfo>,
    },
    /// The game state changed.
    StateUpdated {
        /// The session.
        id: SessionId,
        /// The view for this topic's audience.
        view: GameView,
        /// Whether this is a player's private view.
        for_player: bool,
    },
}

/// Delivers events to topics.
///
/// Passed explicitly into every mutating store operation so the session
/// engine has no transport dependency of its own.
pub trait Fanout: Send + Sync {
    /// Deliver `event` to every subscriber of `topic`.
    ///
    /// Publishing to a topic nobody listens on is not an error.
    fn publish(&self, topic: Topic, event: GameEvent);

    /// Announce a roster change on the public topic.
    fn deliver_players(&self, id: SessionId, players: &[UserInfo]) {
        self.publish(
            Topic::Public(id),
            GameEvent::PlayersUpdated {
                id,
                players: players.to_vec(),
            },
        );
    }

    /// Send the public view to the public topic and each private view to
    /// its own player's topic only.
    fn deliver_views(&self, id: SessionId, updates: &ViewUpdates) {
        self.publish(
            Topic::Public(id),
            GameEvent::StateUpdated {
                id,
                view: updates.public.clone(),
                for_player: false,
            },
        );
        for pv in &updates.players {
            self.publish(
                Topic::Private(id, pv.player),
                GameEvent::StateUpdated {
                    id,
                    view: pv.view.clone(),
                    for_player: true,
                },
            );
        }
    }
}

/// A [`Fanout`] that does nothing. For callers with no live audience.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpFanout;

impl Fanout for NoOpFanout {
    fn publish(&self, _topic: Topic, _event: GameEvent) {}
}

/// In-process fanout over broadcast channels, one per topic.
#[derive(Debug, Default)]
pub struct ChannelFanout {
    topics: Mutex<HashMap<Topic, broadcast::Sender<GameEvent>>>,
}

impl ChannelFanout {
    /// Create a fanout with no topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `topic`, creating it on first use.
    ///
    /// Returns `None` only if the topic table's lock was poisoned.
    pub fn subscribe(&self, topic: Topic) -> Option<broadcast::Receiver<GameEvent>> {
        let Ok(mut topics) = self.topics.lock() else {
            warn!(?topic, "fanout topic table poisoned, cannot subscribe");
            return None;
        };
        let rx = topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        Some(rx)
    }

    /// Drop `topic` once its last receiver is gone.
    ///
    /// Subscribers call this after dropping their receiver so topics of
    /// sessions that never publish do not accumulate.
    pub fn release(&self, topic: Topic) {
        let Ok(mut topics) = self.topics.lock() else {
            warn!(?topic, "fanout topic table poisoned, cannot release");
            return;
        };
        if topics
            .get(&topic)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            topics.remove(&topic);
            trace!(?topic, "topic released");
        }
    }

    /// Number of topics with a live channel.
    pub fn topic_count(&self) -> usize {
        self.topics.lock().map_or(0, |t| t.len())
    }
}

impl Fanout for ChannelFanout {
    fn publish(&self, topic: Topic, event: GameEvent) {
        let Ok(mut topics) = self.topics.lock() else {
            warn!(?topic, "fanout topic table poisoned, dropping event");
            return;
        };
        let Some(tx) = topics.get(&topic) else {
            return;
        };
        // send fails only when every receiver has gone away.
        match tx.send(event) {
            Ok(receivers) => trace!(?topic, receivers, "event published"),
            Err(_) => {
                topics.remove(&topic);
                trace!(?topic, "topic has no subscribers left, removed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arena_types::NimView;

    use super::*;
    use crate::projector::PlayerView;

    fn nim(remaining: u32) -> GameView {
        GameView::Nim(NimView {
            remaining,
            next_player: 0,
        })
    }

    #[test]
    fn private_views_reach_only_their_player() {
        let fanout = ChannelFanout::new();
        let id = SessionId::new();
        let (a, b) = (UserId::new(), UserId::new());

        let mut public = fanout.subscribe(Topic::Public(id)).unwrap();
        let mut for_a = fanout.subscribe(Topic::Private(id, a)).unwrap();
        let mut for_b = fanout.subscribe(Topic::Private(id, b)).unwrap();

        let updates = ViewUpdates {
            public: nim(1),
            players: vec![
                PlayerView { player: a, view: nim(2) },
                PlayerView { player: b, view: nim(3) },
            ],
        };
        fanout.deliver_views(id, &updates);

        assert_eq!(
            public.try_recv().unwrap(),
            GameEvent::StateUpdated { id, view: nim(1), for_player: false }
        );
        assert_eq!(
            for_a.try_recv().unwrap(),
            GameEvent::StateUpdated { id, view: nim(2), for_player: true }
        );
        assert_eq!(
            for_b.try_recv().unwrap(),
            GameEvent::StateUpdated { id, view: nim(3), for_player: true }
        );
        assert!(for_a.try_recv().is_err());
        assert!(public.try_recv().is_err());
    }

    #[test]
    fn sessions_do_not_share_topics() {
        let fanout = ChannelFanout::new();
        let (one, two) = (SessionId::new(), SessionId::new());
        let mut rx = fanout.subscribe(Topic::Public(one)).unwrap();

        fanout.deliver_players(two, &[]);
        assert!(rx.try_recv().is_err());

        fanout.deliver_players(one, &[]);
        assert!(matches!(rx.try_recv().unwrap(), GameEvent::PlayersUpdated { .. }));
    }

    #[test]
    fn abandoned_topics_are_dropped_on_publish() {
        let fanout = ChannelFanout::new();
        let id = SessionId::new();
        drop(fanout.subscribe(Topic::Public(id)));
        assert_eq!(fanout.topic_count(), 1);

        fanout.deliver_players(id, &[]);
        assert_eq!(fanout.topic_count(), 0);
    }

    #[test]
    fn release_keeps_topics_with_live_receivers() {
        let fanout = ChannelFanout::new();
        let id = SessionId::new();
        let first = fanout.subscribe(Topic::Public(id)).unwrap();
        let second = fanout.subscribe(Topic::Public(id)).unwrap();

        drop(first);
        fanout.release(Topic::Public(id));
        assert_eq!(fanout.topic_count(), 1);

        drop(second);
        fanout.release(Topic::Public(id));
        assert_eq!(fanout.topic_count(), 0);

        // Releasing an unknown topic is a no-op.
        fanout.release(Topic::Private(id, UserId::new()));
        assert_eq!(fanout.topic_count(), 0);
    }
}
