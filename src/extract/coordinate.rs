//! Galactic map coordinates from `planets.planet`.

use rusqlite::{params, Transaction};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CoordinateIndex, ExtractStats, Projection};
use crate::error::Error;
use crate::names;

#[derive(Debug, Deserialize)]
struct CoordinateShape {
    x: f64,
    y: f64,
    origin: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRow {
    pub planet_id: i64,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub system_id: Option<i64>,
}

/// Project planet coordinates. Planets without a `coordinate` block are
/// skipped silently. `None` when `planets.planet` is absent.
pub fn project(doc: &Value) -> Option<Projection<CoordinateRow>> {
    let Some(planets) = doc
        .get("planets")
        .and_then(|planets| planets.get("planet"))
        .and_then(Value::as_object)
    else {
        info!("Planets data not found, skipping planet coordinate population");
        return None;
    };

    let mut projection = Projection::default();
    for (key, planet) in planets {
        let Some(coordinate) = planet.get("coordinate") else {
            continue;
        };
        let Ok(planet_id) = key.parse::<i64>() else {
            warn!(planet_id = %key, "Planet id is not numeric, skipping");
            projection.skipped += 1;
            continue;
        };

        match CoordinateShape::deserialize(coordinate) {
            Ok(coordinate) => projection.rows.push(CoordinateRow {
                planet_id,
                name: names::planet_name(planet.get("name")),
                x: coordinate.x,
                y: coordinate.y,
                system_id: coordinate.origin,
            }),
            Err(e) => {
                debug!(planet_id, error = %e, "Skipping planet with invalid coordinate");
                projection.skipped += 1;
            }
        }
    }
    Some(projection)
}

/// Index of planets that have a coordinate row.
pub fn index(rows: &[CoordinateRow]) -> CoordinateIndex {
    let mut index = CoordinateIndex::default();
    for row in rows {
        index.insert(row.planet_id);
    }
    index
}

/// Write coordinate rows for `gamestate_id` and return the index of
/// persisted planets.
pub fn populate(
    tx: &Transaction<'_>,
    gamestate_id: i64,
    doc: &Value,
) -> Result<(ExtractStats, CoordinateIndex), Error> {
    let Some(projection) = project(doc) else {
        return Ok((ExtractStats::default(), CoordinateIndex::default()));
    };

    let mut stmt = tx.prepare_cached(
        r#"
        INSERT INTO planet_coordinate (gamestate_id, planet_id, name, x, y, system_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?;
    for row in &projection.rows {
        stmt.execute(params![
            gamestate_id,
            row.planet_id,
            row.name,
            row.x,
            row.y,
            row.system_id
        ])?;
    }

    debug!(
        gamestate_id,
        inserted = projection.rows.len(),
        skipped = projection.skipped,
        "Populated planet coordinate table"
    );
    Ok((
        ExtractStats {
            inserted: projection.rows.len(),
            skipped: projection.skipped,
        },
        index(&projection.rows),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::extract::tests::gamestate_db;

    #[test]
    fn test_coordinates_and_skips() {
        let doc = json!({
            "planets": { "planet": {
                "1": { "name": { "key": "NAME_Earth" }, "coordinate": { "x": 10.5, "y": -3, "origin": 7 } },
                "2": { "name": "Mars" },
                "3": { "coordinate": { "x": "far", "y": 0 } },
                "4": { "coordinate": { "x": 1, "y": 2 } }
            } }
        });

        let (mut db, gamestate_id) = gamestate_db();
        let tx = db.transaction().unwrap();
        let (stats, index) = populate(&tx, gamestate_id, &doc).unwrap();
        tx.commit().unwrap();

        assert_eq!(stats, ExtractStats { inserted: 2, skipped: 1 });
        assert!(index.contains(1));
        assert!(!index.contains(2));
        assert!(!index.contains(3));
        assert!(index.contains(4));

        let (name, x, y, system): (String, f64, f64, Option<i64>) = db
            .conn()
            .query_row(
                "SELECT name, x, y, system_id FROM planet_coordinate WHERE planet_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!((name.as_str(), x, y, system), ("Earth", 10.5, -3.0, Some(7)));

        let system: Option<i64> = db
            .conn()
            .query_row("SELECT system_id FROM planet_coordinate WHERE planet_id = 4", [], |row| row.get(0))
            .unwrap();
        assert_eq!(system, None);
    }

    #[test]
    fn test_absent_planets() {
        assert!(project(&json!({})).is_none());
        assert!(project(&json!({ "planets": {} })).is_none());
    }
}
