//! Configuration loading and typed config structures for the Arena server.
//!
//! The canonical configuration lives in `arena-config.yaml` at the project
//! root; `ARENA_CONFIG` points the server at a different file. Every field
//! has a default, so a partial file (or no file at all) is valid.

use std::path::Path;

use arena_rules::RuleSettings;
use serde::Deserialize;

/// Config file read when `ARENA_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "arena-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from the config file.
    File,
    /// The file did not exist; built-in defaults were used.
    Defaults,
}

/// Top-level server configuration.
///
/// Mirrors the structure of `arena-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArenaConfig {
    /// Bind address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tunables for the built-in games.
    #[serde(default)]
    pub games: GamesConfig,

    /// Accounts accepted by the built-in credential verifier.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl ArenaConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist.
    ///
    /// Environment overrides are applied in both cases:
    /// - `ARENA_HOST` overrides `server.host`
    /// - `ARENA_PORT` overrides `server.port`
    /// - `ARENA_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        let (mut config, source) = match std::fs::read_to_string(path) {
            Ok(contents) => (serde_yml::from_str(&contents)?, ConfigSource::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), ConfigSource::Defaults)
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok((config, source))
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// Values that do not parse (a non-numeric port) are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("ARENA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ARENA_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("ARENA_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

/// Listen address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host name or IP address to bind (e.g. `0.0.0.0`, `localhost`).
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port; `0` picks a free one.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. `info`, `arena_session=debug`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Game tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GamesConfig {
    /// Pile size at the start of a subtraction game.
    #[serde(default = "default_nim_starting_objects")]
    pub nim_starting_objects: u32,

    /// Roster size at which a guessing game starts on its own.
    #[serde(default = "default_guess_max_players")]
    pub guess_max_players: usize,
}

impl Default for GamesConfig {
    fn default() -> Self {
        Self {
            nim_starting_objects: default_nim_starting_objects(),
            guess_max_players: default_guess_max_players(),
        }
    }
}

impl GamesConfig {
    /// Settings for the rule registry.
    pub const fn rule_settings(&self) -> RuleSettings {
        RuleSettings {
            nim_starting_objects: self.nim_starting_objects,
            guess_max_players: self.guess_max_players,
        }
    }
}

/// One login accepted by the built-in credential verifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    /// Login name. Also the seed of the account's stable user ID.
    pub username: String,
    /// Plain-text password.
    pub password: String,
    /// Display name; the username is used if absent.
    #[serde(default)]
    pub display: Option<String>,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_nim_starting_objects() -> u32 {
    RuleSettings::default().nim_starting_objects
}

fn default_guess_max_players() -> usize {
    RuleSettings::default().guess_max_players
}
