//! HTTP and `WebSocket` server for the Arena game session engine.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` channel** (`/ws`) for watching, joining, starting, and
//!   playing sessions, with per-session public and per-player private
//!   notifications
//! - **REST endpoints** for creating and listing sessions and for reading
//!   a session's history and replay
//!
//! Authentication is a pluggable [`Authenticator`]; the binary uses a
//! [`StaticAuthenticator`] over the accounts in `arena-config.yaml`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use auth::{Authenticator, Credentials, StaticAuthenticator};
pub use config::{ArenaConfig, ConfigError, ConfigSource, ServerConfig};
pub use error::ApiError;
pub use router::build_router;
pub use server::{ArenaServer, ServerError, shutdown_signal};
pub use state::AppState;
