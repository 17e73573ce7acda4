//! Arena server entry point.
//!
//! Loads `arena-config.yaml` (or the file named by `ARENA_CONFIG`),
//! initializes logging, registers the built-in games, and serves the HTTP
//! and `WebSocket` API until `Ctrl-C`.

use std::path::PathBuf;
use std::sync::Arc;

use arena_rules::RuleRegistry;
use arena_server::config::{DEFAULT_CONFIG_PATH, LoggingConfig};
use arena_server::{AppState, ArenaConfig, ArenaServer, ConfigSource, StaticAuthenticator, shutdown_signal};
use arena_session::SessionStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the config file is unreadable or the server fails
/// to bind or serve.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::var("ARENA_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, source) = ArenaConfig::load(&path)?;

    init_logging(&config.logging);
    info!("arena-server starting");
    if source == ConfigSource::Defaults {
        warn!(path = %path.display(), "config file not found, using defaults");
    }

    let registry = RuleRegistry::standard(&config.games.rule_settings());
    info!(
        games = ?registry.keys().collect::<Vec<_>>(),
        nim_starting_objects = config.games.nim_starting_objects,
        guess_max_players = config.games.guess_max_players,
        "games registered"
    );

    let auth = StaticAuthenticator::from_accounts(&config.accounts);
    if auth.is_empty() {
        warn!("no accounts configured; every authenticated request will be refused");
    } else {
        info!(accounts = auth.len(), "accounts loaded");
    }

    let state = Arc::new(AppState::new(SessionStore::new(registry), Arc::new(auth)));
    ArenaServer::bind(&config.server, state)
        .await?
        .run(shutdown_signal())
        .await?;

    Ok(())
}

/// Initialize structured logging. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
