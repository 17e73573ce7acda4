//! Session engine for Arena: lifecycle, history, replay, and fanout.
//!
//! A session moves through `waiting -> active -> done`. All mutations of
//! one session are serialized by the [`SessionStore`], each accepted move is
//! appended to the session's [`HistoryLog`], and every state change is
//! projected per audience and handed to a [`Fanout`] for delivery.
//!
//! # Modules
//!
//! - [`error`] -- Session error type
//! - [`fanout`] -- Topic routing for roster and state notifications
//! - [`history`] -- Append-only move log
//! - [`projector`] -- Per-audience view projection
//! - [`replay`] -- Reconstruction of past views from history
//! - [`session`] -- The per-session state machine
//! - [`store`] -- Concurrent session registry

pub mod error;
pub mod fanout;
pub mod history;
pub mod projector;
pub mod replay;
pub mod session;
pub mod store;

pub use error::SessionError;
pub use fanout::{ChannelFanout, Fanout, GameEvent, NoOpFanout, Topic};
pub use history::HistoryLog;
pub use projector::{PlayerView, ViewUpdates, project};
pub use replay::{ReplaySource, build_replay};
pub use session::GameSession;
pub use store::SessionStore;
