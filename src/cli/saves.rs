//! List saves on disk or in the database.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::db::Database;
use crate::error::Error;

/// A save directory under the data dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDir {
    pub name: String,
    /// Whether the directory holds the configured save file.
    pub has_save: bool,
}

/// Save directories under `data_dir`, sorted by name.
pub fn find_save_dirs(data_dir: &Path, save_file_name: &str) -> Result<Vec<SaveDir>, Error> {
    let mut saves = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        saves.push(SaveDir {
            name: entry.file_name().to_string_lossy().to_string(),
            has_save: entry.path().join(save_file_name).is_file(),
        });
    }
    saves.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(saves)
}

/// Run the list-saves command.
pub fn run(config: &Config, from_db: bool) -> Result<(), Error> {
    if from_db {
        let db = Database::open(&config.database.path)?;
        let saves = db.list_saves()?;
        if saves.is_empty() {
            println!("No saves ingested yet.");
        }
        for save in saves {
            let gamestates = db.list_gamestates(save.save_id)?;
            match gamestates.last() {
                Some(latest) => println!(
                    "{}  \"{}\"  {} snapshots, latest {}",
                    save.filename,
                    save.name,
                    gamestates.len(),
                    latest.date
                ),
                None => println!("{}  \"{}\"  no snapshots", save.filename, save.name),
            }
        }
        return Ok(());
    }

    let data_dir = &config.parser.data_dir;
    if !data_dir.exists() {
        println!("Data directory {} does not exist.", data_dir.display());
        return Ok(());
    }
    for save in find_save_dirs(data_dir, &config.parser.save_file_name)? {
        if save.has_save {
            println!("{}", save.name);
        } else {
            println!("{}  (no {})", save.name, config.parser.save_file_name);
        }
    }
    Ok(())
}
