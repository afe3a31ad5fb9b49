//! Configuration management for the ingester.
//!
//! Values come from `~/.stellaris-stats/config.toml` (or an explicit path), then
//! `STELLARIS_STATS_*` environment variables override individual fields.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Global ingester configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            database: DatabaseConfig::default(),
            events: EventsConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Directory holding one sub-directory per save.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Archive file name inside each save directory.
    #[serde(default = "default_save_file_name")]
    pub save_file_name: String,

    /// Polling interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            save_file_name: default_save_file_name(),
            interval_ms: default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Unix socket of the event relay. Events are only logged when unset.
    #[serde(default)]
    pub socket_path: Option<String>,

    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            topic: default_topic(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/stellaris-data")
}

fn default_save_file_name() -> String {
    "ironman.sav".to_string()
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_db_path() -> PathBuf {
    Config::global_dir().join("stellaris-stats.db")
}

fn default_topic() -> String {
    "GAMESTATE_CREATED".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load config from an explicit path, or `~/.stellaris-stats/config.toml`,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::path);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `STELLARIS_STATS_*` overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("STELLARIS_STATS_DATA_DIR") {
            self.parser.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("STELLARIS_STATS_PARSER_INTERVAL") {
            self.parser.interval_ms =
                raw.trim().parse().map_err(|_| Error::ConfigValue {
                    key: "STELLARIS_STATS_PARSER_INTERVAL",
                    value: raw.clone(),
                })?;
        }
        if let Some(path) = lookup("STELLARIS_STATS_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(socket) = lookup("STELLARIS_STATS_EVENT_SOCKET") {
            self.events.socket_path = Some(socket).filter(|s| !s.is_empty());
        }
        if let Some(topic) = lookup("STELLARIS_STATS_EVENT_TOPIC") {
            self.events.topic = topic;
        }
        if let Some(level) = lookup("STELLARIS_STATS_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Polling interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.parser.interval_ms.max(1))
    }

    /// Archive path for a save directory name.
    pub fn save_path(&self, save_name: &str) -> PathBuf {
        self.parser
            .data_dir
            .join(save_name)
            .join(&self.parser.save_file_name)
    }

    /// Path to global directory (~/.stellaris-stats/)
    pub fn global_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stellaris-stats")
    }

    /// Path to config file
    pub fn path() -> PathBuf {
        Self::global_dir().join("config.toml")
    }
}
