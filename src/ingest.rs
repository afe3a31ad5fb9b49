//! Ingestion of one save archive into a monthly snapshot.
//!
//! One ingestion reads the archive, decodes it, upserts the save, and then,
//! inside a single transaction, checks for an existing snapshot in the same
//! calendar month, inserts the gamestate and runs every extractor. The event
//! is published only after commit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::Config;
use crate::date::GameDate;
use crate::db::{find_gamestate_by_month, insert_gamestate, Database};
use crate::decoder::{SaveDecoder, TextDecoder};
use crate::error::Error;
use crate::events::{EventPublisher, GamestateCreated, Publisher};
use crate::extract::{budget, coordinate, empire, empire_planet, relation, ExtractStats};

/// Per-extractor results of one ingestion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub budget: ExtractStats,
    pub empire: ExtractStats,
    pub relation: ExtractStats,
    pub coordinate: ExtractStats,
    pub empire_planet: ExtractStats,
}

/// Run every extractor for a freshly inserted gamestate, in dependency order.
pub fn populate_gamestate(
    tx: &rusqlite::Transaction<'_>,
    gamestate_id: i64,
    doc: &Value,
) -> Result<IngestStats, Error> {
    let budget = budget::populate(tx, gamestate_id, doc)?;
    let (empire, empires) = empire::populate(tx, gamestate_id, doc)?;
    let relation = relation::populate(tx, gamestate_id, doc, &empires)?;
    let (coordinate, coordinates) = coordinate::populate(tx, gamestate_id, doc)?;
    let empire_planet = empire_planet::link_empire_planets(tx, gamestate_id, &empires, &coordinates)?;

    Ok(IngestStats {
        budget,
        empire,
        relation,
        coordinate,
        empire_planet,
    })
}

/// Snapshot date from the top-level `date` field.
fn snapshot_date(doc: &Value) -> Result<GameDate, Error> {
    match doc.get("date") {
        Some(Value::String(text)) => text.parse(),
        Some(other) => Err(Error::InvalidDate(other.to_string())),
        None => Err(Error::MissingField("date")),
    }
}

/// Ingest one save archive.
///
/// Returns the created snapshot, or `None` when the save already has a
/// snapshot for the same calendar month.
pub fn ingest_save(
    db: &mut Database,
    decoder: &dyn SaveDecoder,
    archive_path: &Path,
    filename: &str,
) -> Result<Option<GamestateCreated>, Error> {
    if !archive_path.exists() {
        return Err(Error::SaveNotFound(archive_path.to_path_buf()));
    }

    let bytes = archive::read_gamestate(archive_path)?;
    let doc = decoder.decode(&bytes)?;

    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(filename);
    let date = snapshot_date(&doc)?;

    let save_id = db.upsert_save(filename, name)?;

    let tx = db.transaction()?;
    if let Some(existing) = find_gamestate_by_month(&tx, save_id, &date)? {
        debug!(
            save_id,
            gamestate_id = existing.gamestate_id,
            month = %date.month_key(),
            "Gamestate for month already exists, skipping"
        );
        return Ok(None);
    }

    let gamestate_id = insert_gamestate(&tx, save_id, &date, &doc)?;
    let stats = populate_gamestate(&tx, gamestate_id, &doc)?;
    tx.commit()?;

    info!(
        save_id,
        gamestate_id,
        date = %date,
        budget = stats.budget.inserted,
        empires = stats.empire.inserted,
        relations = stats.relation.inserted,
        coordinates = stats.coordinate.inserted,
        empire_planets = stats.empire_planet.inserted,
        "Gamestate ingested"
    );

    Ok(Some(GamestateCreated {
        save_id,
        gamestate_id,
        date,
    }))
}

/// One save source polled by the scheduler.
pub struct Ingestor {
    db_path: PathBuf,
    archive_path: PathBuf,
    filename: String,
    decoder: Arc<dyn SaveDecoder + Send + Sync>,
    publisher: Publisher,
}

impl Ingestor {
    pub fn new(
        db_path: PathBuf,
        archive_path: PathBuf,
        filename: String,
        decoder: Arc<dyn SaveDecoder + Send + Sync>,
        publisher: Publisher,
    ) -> Self {
        Self {
            db_path,
            archive_path,
            filename,
            decoder,
            publisher,
        }
    }

    /// Ingestor for `<data_dir>/<save_name>/<save_file_name>`.
    pub fn from_config(config: &Config, save_name: &str) -> Self {
        Self::new(
            config.database.path.clone(),
            config.save_path(save_name),
            save_name.to_string(),
            Arc::new(TextDecoder),
            Publisher::from_config(&config.events),
        )
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Run one ingestion on a blocking thread, then publish the event.
    ///
    /// Publish failures are logged and do not fail the iteration.
    pub async fn run_iteration(&self) -> Result<Option<GamestateCreated>, Error> {
        let db_path = self.db_path.clone();
        let archive_path = self.archive_path.clone();
        let filename = self.filename.clone();
        let decoder = Arc::clone(&self.decoder);

        let created = tokio::task::spawn_blocking(move || {
            let mut db = Database::open(&db_path)?;
            ingest_save(&mut db, decoder.as_ref(), &archive_path, &filename)
        })
        .await??;

        if let Some(event) = &created {
            if let Err(e) = self.publisher.publish(event).await {
                warn!(gamestate_id = event.gamestate_id, error = %e, "Failed to publish gamestate event");
            }
        }
        Ok(created)
    }
}
