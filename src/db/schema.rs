//! Database schema for saves, snapshots and extracted tables.

use rusqlite::{Connection, Result, Row};

use crate::error::Error;

/// Numeric resource columns of `budget_entry`, in column order.
pub const BUDGET_RESOURCE_COLUMNS: [&str; 20] = [
    "alloys",
    "astral_threads",
    "consumer_goods",
    "energy",
    "engineering_research",
    "exotic_gases",
    "food",
    "influence",
    "minerals",
    "minor_artifacts",
    "nanites",
    "physics_research",
    "rare_crystals",
    "society_research",
    "sr_dark_matter",
    "sr_living_metal",
    "sr_zro",
    "trade",
    "unity",
    "volatile_motes",
];

/// Tables holding rows extracted from one gamestate.
pub const EXTRACTED_TABLES: [&str; 7] = [
    "budget_category",
    "budget_entry",
    "planet_coordinate",
    "empire",
    "empire_planet",
    "diplomatic_relation",
    "opinion_modifier",
];

/// Initialize database with all tables.
pub fn init_db(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS save (
            save_id   INTEGER PRIMARY KEY AUTOINCREMENT,
            filename  TEXT NOT NULL UNIQUE,
            name      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS gamestate (
            gamestate_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            save_id       INTEGER NOT NULL,
            date          TEXT NOT NULL,
            data          TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            FOREIGN KEY (save_id) REFERENCES save(save_id)
        );

        CREATE INDEX IF NOT EXISTS idx_gamestate_save_date ON gamestate(save_id, date);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS budget_entry (
            budget_entry_id       INTEGER PRIMARY KEY AUTOINCREMENT,
            alloys                REAL,
            astral_threads        REAL,
            consumer_goods        REAL,
            energy                REAL,
            engineering_research  REAL,
            exotic_gases          REAL,
            food                  REAL,
            influence             REAL,
            minerals              REAL,
            minor_artifacts       REAL,
            nanites               REAL,
            physics_research      REAL,
            rare_crystals         REAL,
            society_research      REAL,
            sr_dark_matter        REAL,
            sr_living_metal       REAL,
            sr_zro                REAL,
            trade                 REAL,
            unity                 REAL,
            volatile_motes        REAL
        );

        CREATE TABLE IF NOT EXISTS budget_category (
            gamestate_id     INTEGER NOT NULL,
            category_type    TEXT NOT NULL CHECK (category_type IN ('income', 'expenses', 'balance')),
            category_name    TEXT NOT NULL,
            budget_entry_id  INTEGER NOT NULL,
            PRIMARY KEY (gamestate_id, category_type, category_name),
            FOREIGN KEY (gamestate_id) REFERENCES gamestate(gamestate_id),
            FOREIGN KEY (budget_entry_id) REFERENCES budget_entry(budget_entry_id)
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS empire (
            gamestate_id             INTEGER NOT NULL,
            country_id               TEXT NOT NULL,
            name                     TEXT NOT NULL,
            is_player                INTEGER NOT NULL DEFAULT 0,
            capital_planet_id        INTEGER,
            owned_planet_count       INTEGER NOT NULL DEFAULT 0,
            controlled_planet_count  INTEGER NOT NULL DEFAULT 0,
            military_power           REAL,
            economy_power            REAL,
            tech_power               REAL,
            PRIMARY KEY (gamestate_id, country_id),
            FOREIGN KEY (gamestate_id) REFERENCES gamestate(gamestate_id)
        );

        CREATE TABLE IF NOT EXISTS planet_coordinate (
            gamestate_id  INTEGER NOT NULL,
            planet_id     INTEGER NOT NULL,
            name          TEXT,
            x             REAL NOT NULL,
            y             REAL NOT NULL,
            system_id     INTEGER,
            PRIMARY KEY (gamestate_id, planet_id),
            FOREIGN KEY (gamestate_id) REFERENCES gamestate(gamestate_id)
        );

        CREATE TABLE IF NOT EXISTS empire_planet (
            gamestate_id  INTEGER NOT NULL,
            country_id    TEXT NOT NULL,
            planet_id     INTEGER NOT NULL,
            PRIMARY KEY (gamestate_id, country_id, planet_id),
            FOREIGN KEY (gamestate_id, country_id) REFERENCES empire(gamestate_id, country_id),
            FOREIGN KEY (gamestate_id, planet_id) REFERENCES planet_coordinate(gamestate_id, planet_id)
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS diplomatic_relation (
            diplomatic_relation_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            gamestate_id            INTEGER NOT NULL,
            source_country_id       TEXT NOT NULL,
            target_country_id       TEXT NOT NULL,
            opinion                 REAL,
            trust                   REAL,
            threat                  REAL,
            is_hostile              INTEGER NOT NULL DEFAULT 0,
            border_range            REAL,
            has_contact             INTEGER NOT NULL DEFAULT 0,
            has_communications      INTEGER NOT NULL DEFAULT 0,
            UNIQUE (gamestate_id, source_country_id, target_country_id),
            FOREIGN KEY (gamestate_id, source_country_id) REFERENCES empire(gamestate_id, country_id),
            FOREIGN KEY (gamestate_id, target_country_id) REFERENCES empire(gamestate_id, country_id)
        );

        CREATE TABLE IF NOT EXISTS opinion_modifier (
            diplomatic_relation_id  INTEGER NOT NULL,
            modifier_type           TEXT NOT NULL,
            value                   REAL NOT NULL,
            PRIMARY KEY (diplomatic_relation_id, modifier_type),
            FOREIGN KEY (diplomatic_relation_id) REFERENCES diplomatic_relation(diplomatic_relation_id)
        );
        "#,
    )?;

    Ok(())
}

/// Save record.
#[derive(Debug, Clone)]
pub struct SaveRecord {
    pub save_id: i64,
    pub filename: String,
    pub name: String,
}

impl SaveRecord {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            save_id: row.get("save_id")?,
            filename: row.get("filename")?,
            name: row.get("name")?,
        })
    }
}

/// Gamestate record without its document.
#[derive(Debug, Clone)]
pub struct GamestateRecord {
    pub gamestate_id: i64,
    pub save_id: i64,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl GamestateRecord {
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            gamestate_id: row.get("gamestate_id")?,
            save_id: row.get("save_id")?,
            date: row.get("date")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 9);
    }

    #[test]
    fn test_budget_columns_match_table() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(budget_entry)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>("name"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let resources: Vec<&str> = columns
            .iter()
            .map(String::as_str)
            .filter(|c| *c != "budget_entry_id")
            .collect();
        assert_eq!(resources, BUDGET_RESOURCE_COLUMNS);
    }
}
