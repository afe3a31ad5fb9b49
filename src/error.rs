//! Error types for the Stellaris stats ingester.

use std::path::PathBuf;

use thiserror::Error;

/// Ingester error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config value for {key}: {value}")]
    ConfigValue { key: &'static str, value: String },

    #[error("gamestate entry not found in archive {0}")]
    GamestateEntryNotFound(PathBuf),

    #[error("Save file not found: {0}")]
    SaveNotFound(PathBuf),

    #[error("Decode error: {0}")]
    Decode(#[from] jomini::Error),

    #[error("Invalid game date: {0}")]
    InvalidDate(String),

    #[error("Gamestate document is missing required field: {0}")]
    MissingField(&'static str),

    #[error("No gamestate for save '{save}' on {date}")]
    SnapshotNotFound { save: String, date: String },

    #[error("Gamestate not found: {0}")]
    GamestateNotFound(i64),

    #[error("Ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Event publish error: {0}")]
    Publish(String),
}
