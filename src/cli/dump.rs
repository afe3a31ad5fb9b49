//! Dump a decoded gamestate as one JSON file per top-level key.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::archive;
use crate::config::Config;
use crate::date::GameDate;
use crate::db::Database;
use crate::decoder::{SaveDecoder, TextDecoder};
use crate::error::Error;

/// Default base directory for dumps.
pub const DEFAULT_OUTPUT_DIR: &str = "gamestate-json-data";

/// Replace the `.json` files in `dir` with one file per top-level key.
/// Returns the number of files written.
pub fn write_sections(doc: &Value, dir: &Path) -> Result<usize, Error> {
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
            }
        }
    } else {
        fs::create_dir_all(dir)?;
    }

    let Some(sections) = doc.as_object() else {
        return Err(Error::MissingField("top-level block"));
    };
    for (key, value) in sections {
        fs::write(dir.join(format!("{key}.json")), serde_json::to_string_pretty(value)?)?;
    }
    Ok(sections.len())
}

/// Run the dump command. Reads the save archive, or the stored snapshot of
/// `date` when given.
pub fn run(
    config: &Config,
    save_name: &str,
    date: Option<&str>,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let doc = match date {
        Some(date) => {
            let date: GameDate = date.parse()?;
            let db = Database::open(&config.database.path)?;
            let record = db
                .find_gamestate(save_name, &date)?
                .ok_or_else(|| Error::SnapshotNotFound {
                    save: save_name.to_string(),
                    date: date.to_iso(),
                })?;
            db.load_gamestate_data(record.gamestate_id)?
        }
        None => {
            let path = config.save_path(save_name);
            if !path.exists() {
                return Err(Error::SaveNotFound(path));
            }
            TextDecoder.decode(&archive::read_gamestate(&path)?)?
        }
    };

    let date = match doc.get("date") {
        Some(Value::String(text)) => text.parse::<GameDate>()?,
        _ => return Err(Error::MissingField("date")),
    };
    let dir = output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
        .join(save_name)
        .join(date.to_iso());

    let written = write_sections(&doc, &dir)?;
    println!("Wrote {} gamestate JSON files to {}", written, dir.display());
    Ok(())
}
