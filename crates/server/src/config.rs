// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration: TOML file, `QUAERO_`-prefixed environment overrides.
//!
//! Precedence, lowest to highest: built-in defaults, config file,
//! environment. Parse failures are fatal — a server with a half-read
//! config is worse than no server.

use quaero_core::LogLevel;
use quaero_engine::QueueConfig;
use quaero_storage::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "QUAERO_";
pub const DEFAULT_CONFIG_FILE: &str = "quaero.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
    pub host: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { port: default_port(), host: default_host() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub sqlite: SqliteSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteSection {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub wal_mode: bool,
    pub reset_on_startup: bool,
}

impl Default for SqliteSection {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        Self {
            path: defaults.path,
            busy_timeout_ms: defaults.busy_timeout_ms,
            wal_mode: defaults.wal_mode,
            reset_on_startup: defaults.reset_on_startup,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub queue_name: String,
    pub concurrency: u32,
    /// Seconds between idle polls.
    pub poll_interval: u64,
    /// Seconds a received message stays hidden.
    pub visibility_timeout: u64,
    pub max_receive: u32,
}

impl Default for QueueSection {
    fn default() -> Self {
        let defaults = QueueConfig::default();
        Self {
            queue_name: defaults.queue_name,
            concurrency: defaults.concurrency,
            poll_interval: defaults.poll_interval.as_secs(),
            visibility_timeout: defaults.visibility_timeout.as_secs(),
            max_receive: defaults.max_receive,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub google_api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub min_event_level: LogLevel,
    /// Directory for rotated server log files; stderr-only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { min_event_level: LogLevel::Info, log_dir: None }
    }
}

/// Full server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub queue: QueueSection,
    pub agent: AgentSection,
    pub logging: LoggingSection,
}

impl Config {
    /// Load from `path` (or the default file when present), then apply
    /// environment overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Apply `QUAERO_*` overrides. Unknown keys under the prefix are
    /// ignored; unparseable values are fatal.
    pub fn apply_env(
        &mut self,
        vars: impl Iterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value.parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: value.to_string(),
            })
        }

        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else { continue };
            match name {
                "SERVER_PORT" => self.server.port = parse(&key, &value)?,
                "SERVER_HOST" => self.server.host = value,
                "STORAGE_SQLITE_PATH" => self.storage.sqlite.path = PathBuf::from(value),
                "STORAGE_SQLITE_BUSY_TIMEOUT_MS" => {
                    self.storage.sqlite.busy_timeout_ms = parse(&key, &value)?
                }
                "STORAGE_SQLITE_WAL_MODE" => self.storage.sqlite.wal_mode = parse(&key, &value)?,
                "STORAGE_SQLITE_RESET_ON_STARTUP" => {
                    self.storage.sqlite.reset_on_startup = parse(&key, &value)?
                }
                "QUEUE_QUEUE_NAME" => self.queue.queue_name = value,
                "QUEUE_CONCURRENCY" => self.queue.concurrency = parse(&key, &value)?,
                "QUEUE_POLL_INTERVAL" => self.queue.poll_interval = parse(&key, &value)?,
                "QUEUE_VISIBILITY_TIMEOUT" => {
                    self.queue.visibility_timeout = parse(&key, &value)?
                }
                "QUEUE_MAX_RECEIVE" => self.queue.max_receive = parse(&key, &value)?,
                "AGENT_GOOGLE_API_KEY" => self.agent.google_api_key = Some(value),
                "AGENT_MODEL" => self.agent.model = Some(value),
                "LOGGING_MIN_EVENT_LEVEL" => {
                    self.logging.min_event_level = parse(&key, &value)?
                }
                "LOGGING_LOG_DIR" => self.logging.log_dir = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.storage.sqlite.path.clone(),
            busy_timeout_ms: self.storage.sqlite.busy_timeout_ms,
            wal_mode: self.storage.sqlite.wal_mode,
            reset_on_startup: self.storage.sqlite.reset_on_startup,
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            queue_name: self.queue.queue_name.clone(),
            concurrency: self.queue.concurrency,
            poll_interval: Duration::from_secs(self.queue.poll_interval),
            visibility_timeout: Duration::from_secs(self.queue.visibility_timeout),
            max_receive: self.queue.max_receive,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
