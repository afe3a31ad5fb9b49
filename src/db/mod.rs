//! SQLite storage for saves, monthly snapshots and extracted tables.

mod schema;

pub use schema::{init_db, GamestateRecord, SaveRecord, BUDGET_RESOURCE_COLUMNS, EXTRACTED_TABLES};

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::Value;

use crate::date::GameDate;
use crate::error::Error;

/// Persisted row counts per extracted table for one gamestate.
pub type RowCounts = BTreeMap<&'static str, i64>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at path.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Open in-memory database for testing.
    pub fn open_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    /// Get connection reference.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start the single write transaction of an ingestion.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, Error> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    // ========== Saves ==========

    /// Insert a save by filename, or refresh its name. Returns the save id.
    pub fn upsert_save(&self, filename: &str, name: &str) -> Result<i64, Error> {
        let save_id = self.conn.query_row(
            r#"
            INSERT INTO save (filename, name) VALUES (?1, ?2)
            ON CONFLICT(filename) DO UPDATE SET name = excluded.name
            RETURNING save_id
            "#,
            params![filename, name],
            |row| row.get(0),
        )?;
        Ok(save_id)
    }

    pub fn list_saves(&self) -> Result<Vec<SaveRecord>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT save_id, filename, name FROM save ORDER BY filename")?;
        let rows = stmt.query_map([], SaveRecord::from_row)?;

        let mut saves = Vec::new();
        for row in rows {
            saves.push(row?);
        }
        Ok(saves)
    }

    // ========== Gamestates ==========

    pub fn find_gamestate_by_month(
        &self,
        save_id: i64,
        date: &GameDate,
    ) -> Result<Option<GamestateRecord>, Error> {
        find_gamestate_by_month(&self.conn, save_id, date)
    }

    /// Snapshots of one save, oldest first.
    pub fn list_gamestates(&self, save_id: i64) -> Result<Vec<GamestateRecord>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT gamestate_id, save_id, date FROM gamestate WHERE save_id = ?1 ORDER BY date",
        )?;
        let rows = stmt.query_map([save_id], GamestateRecord::from_row)?;

        let mut gamestates = Vec::new();
        for row in rows {
            gamestates.push(row?);
        }
        Ok(gamestates)
    }

    /// Snapshot of the save named `filename` taken on exactly `date`.
    pub fn find_gamestate(&self, filename: &str, date: &GameDate) -> Result<Option<GamestateRecord>, Error> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT g.gamestate_id, g.save_id, g.date FROM gamestate g
                JOIN save s ON s.save_id = g.save_id
                WHERE s.filename = ?1 AND g.date = ?2
                "#,
                params![filename, date.to_iso()],
                GamestateRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_gamestate_ids(&self) -> Result<Vec<i64>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT gamestate_id FROM gamestate ORDER BY gamestate_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Parse the stored raw document of a gamestate.
    pub fn load_gamestate_data(&self, gamestate_id: i64) -> Result<Value, Error> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM gamestate WHERE gamestate_id = ?1",
                [gamestate_id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Err(Error::GamestateNotFound(gamestate_id)),
        }
    }

    /// Most recent stored documents, newest first.
    pub fn budget_documents(&self, limit: usize) -> Result<Vec<(i64, Value)>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT gamestate_id, data FROM gamestate ORDER BY gamestate_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (gamestate_id, text) = row?;
            documents.push((gamestate_id, serde_json::from_str(&text)?));
        }
        Ok(documents)
    }

    // ========== Verification ==========

    pub fn count_rows(&self, gamestate_id: i64) -> Result<RowCounts, Error> {
        let queries: [(&'static str, &str); 7] = [
            (
                "budget_category",
                "SELECT COUNT(*) FROM budget_category WHERE gamestate_id = ?1",
            ),
            (
                "budget_entry",
                "SELECT COUNT(DISTINCT budget_entry_id) FROM budget_category WHERE gamestate_id = ?1",
            ),
            (
                "planet_coordinate",
                "SELECT COUNT(*) FROM planet_coordinate WHERE gamestate_id = ?1",
            ),
            ("empire", "SELECT COUNT(*) FROM empire WHERE gamestate_id = ?1"),
            (
                "empire_planet",
                "SELECT COUNT(*) FROM empire_planet WHERE gamestate_id = ?1",
            ),
            (
                "diplomatic_relation",
                "SELECT COUNT(*) FROM diplomatic_relation WHERE gamestate_id = ?1",
            ),
            (
                "opinion_modifier",
                r#"
                SELECT COUNT(*) FROM opinion_modifier om
                JOIN diplomatic_relation dr ON dr.diplomatic_relation_id = om.diplomatic_relation_id
                WHERE dr.gamestate_id = ?1
                "#,
            ),
        ];

        let mut counts = RowCounts::new();
        for (table, sql) in queries {
            let count: i64 = self.conn.query_row(sql, [gamestate_id], |row| row.get(0))?;
            counts.insert(table, count);
        }
        Ok(counts)
    }

    /// Column names of `budget_entry` as the live database reports them.
    pub fn budget_entry_columns(&self) -> Result<Vec<String>, Error> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(budget_entry)")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>("name"))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }
}

/// Existing snapshot of `save_id` in the same calendar month as `date`.
pub fn find_gamestate_by_month(
    conn: &Connection,
    save_id: i64,
    date: &GameDate,
) -> Result<Option<GamestateRecord>, Error> {
    let record = conn
        .query_row(
            r#"
            SELECT gamestate_id, save_id, date FROM gamestate
            WHERE save_id = ?1 AND substr(date, 1, 7) = ?2
            ORDER BY gamestate_id
            LIMIT 1
            "#,
            params![save_id, date.month_key()],
            GamestateRecord::from_row,
        )
        .optional()?;
    Ok(record)
}

/// Insert a snapshot row. Returns the new gamestate id.
pub fn insert_gamestate(
    conn: &Connection,
    save_id: i64,
    date: &GameDate,
    data: &Value,
) -> Result<i64, Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let data = serde_json::to_string(data)?;
    conn.execute(
        "INSERT INTO gamestate (save_id, date, data, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![save_id, date.to_iso(), data, now],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_save_updates_name() {
        let db = Database::open_memory().unwrap();
        let first = db.upsert_save("mysave", "Old Name").unwrap();
        let second = db.upsert_save("mysave", "New Name").unwrap();
        assert_eq!(first, second);

        let saves = db.list_saves().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].name, "New Name");
    }

    #[test]
    fn test_month_lookup_ignores_day() {
        let db = Database::open_memory().unwrap();
        let save_id = db.upsert_save("mysave", "Empire").unwrap();
        let date = GameDate::new(2250, 3, 1).unwrap();
        let id = insert_gamestate(db.conn(), save_id, &date, &json!({ "date": "2250.03.01" })).unwrap();

        assert_eq!(db.find_gamestate("mysave", &date).unwrap().unwrap().gamestate_id, id);
        let later = GameDate::new(2250, 3, 29).unwrap();
        assert!(db.find_gamestate("mysave", &later).unwrap().is_none());
        let found = db.find_gamestate_by_month(save_id, &later).unwrap().unwrap();
        assert_eq!(found.gamestate_id, id);
        assert_eq!(found.date, "2250-03-01");

        let next_month = GameDate::new(2250, 4, 1).unwrap();
        assert!(db.find_gamestate_by_month(save_id, &next_month).unwrap().is_none());

        let other_save = db.upsert_save("other", "Other").unwrap();
        assert!(db.find_gamestate_by_month(other_save, &later).unwrap().is_none());
    }

    #[test]
    fn test_load_gamestate_data() {
        let db = Database::open_memory().unwrap();
        let save_id = db.upsert_save("mysave", "Empire").unwrap();
        let date = GameDate::new(2200, 1, 1).unwrap();
        let data = json!({ "player": [{ "country": 0 }] });
        let id = insert_gamestate(db.conn(), save_id, &date, &data).unwrap();

        assert_eq!(db.load_gamestate_data(id).unwrap(), data);
        assert_eq!(db.list_gamestate_ids().unwrap(), vec![id]);
        assert!(matches!(
            db.load_gamestate_data(id + 1),
            Err(Error::GamestateNotFound(_))
        ));
    }

    #[test]
    fn test_count_rows_empty_gamestate() {
        let db = Database::open_memory().unwrap();
        let save_id = db.upsert_save("mysave", "Empire").unwrap();
        let date = GameDate::new(2200, 1, 1).unwrap();
        let id = insert_gamestate(db.conn(), save_id, &date, &json!({})).unwrap();

        let counts = db.count_rows(id).unwrap();
        assert_eq!(counts.len(), EXTRACTED_TABLES.len());
        assert!(counts.values().all(|count| *count == 0));
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.budget_entry_columns().unwrap().len(), 21);
    }
}
