//! Shared type definitions for the Arena game session engine.
//!
//! Every type that crosses a crate boundary or the wire lives here. Types
//! derive `ts-rs` so the browser client gets matching `TypeScript`
//! definitions in `bindings/`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for users, sessions, and chats
//! - [`enums`] -- Game keys and session lifecycle status
//! - [`structs`] -- Session summaries, play info, and history entries
//! - [`views`] -- Per-audience game views

pub mod enums;
pub mod ids;
pub mod structs;
pub mod views;

pub use enums::{GameKey, SessionStatus, UnknownGameKey};
pub use ids::{ChatId, SessionId, UserId};
pub use structs::{HistoryEntry, PlayInfo, SessionInfo, UserInfo};
pub use views::{Audience, GameView, GuessSlot, GuessView, NimView};
