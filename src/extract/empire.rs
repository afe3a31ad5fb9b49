//! One `empire` row per country in the snapshot.

use rusqlite::{params, Transaction};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{one_or_many, player_country_id, EmpireIndex, ExtractStats, Projection};
use crate::error::Error;
use crate::names;

#[derive(Debug, Deserialize)]
struct CountryShape {
    #[serde(default)]
    name: Option<Value>,
    capital: Option<i64>,
    #[serde(default, deserialize_with = "one_or_many")]
    owned_planets: Vec<i64>,
    #[serde(default, deserialize_with = "one_or_many")]
    controlled_planets: Vec<i64>,
    military_power: Option<f64>,
    economy_power: Option<f64>,
    tech_power: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmpireRow {
    pub country_id: String,
    pub name: String,
    pub is_player: bool,
    pub capital_planet_id: Option<i64>,
    pub owned_planets: Vec<i64>,
    pub controlled_planet_count: usize,
    pub military_power: Option<f64>,
    pub economy_power: Option<f64>,
    pub tech_power: Option<f64>,
}

/// Project every country entry. `None` when the document has no country map.
pub fn project(doc: &Value) -> Option<Projection<EmpireRow>> {
    let countries = match doc.get("country") {
        None | Some(Value::Null) => {
            info!("Country data not found, skipping empire population");
            return None;
        }
        Some(Value::Object(countries)) => countries,
        Some(other) => {
            warn!(found = %type_name(other), "Gamestate validation failed (country is not a map), skipping empire population");
            return None;
        }
    };

    let player = player_country_id(doc);
    let mut projection = Projection::default();

    for (country_id, raw) in countries {
        if !raw.is_object() {
            debug!(country_id = %country_id, "Country entry is not a block, skipping");
            projection.skipped += 1;
            continue;
        }

        let country = match CountryShape::deserialize(raw) {
            Ok(country) => country,
            Err(e) => {
                warn!(country_id = %country_id, error = %e, "Skipping country with invalid schema");
                projection.skipped += 1;
                continue;
            }
        };

        projection.rows.push(EmpireRow {
            country_id: country_id.clone(),
            name: names::empire_name(country.name.as_ref()),
            is_player: player.as_deref() == Some(country_id.as_str()),
            capital_planet_id: country.capital,
            owned_planets: country.owned_planets,
            controlled_planet_count: country.controlled_planets.len(),
            military_power: country.military_power,
            economy_power: country.economy_power,
            tech_power: country.tech_power,
        });
    }
    Some(projection)
}

/// Index of projected empires, for gating relations and planet links.
pub fn index(rows: &[EmpireRow]) -> EmpireIndex {
    let mut index = EmpireIndex::default();
    for row in rows {
        index.insert(row.country_id.clone(), row.owned_planets.clone());
    }
    index
}

/// Write empire rows for `gamestate_id` and return the index of persisted
/// empires.
pub fn populate(
    tx: &Transaction<'_>,
    gamestate_id: i64,
    doc: &Value,
) -> Result<(ExtractStats, EmpireIndex), Error> {
    let Some(projection) = project(doc) else {
        return Ok((ExtractStats::default(), EmpireIndex::default()));
    };

    let mut stmt = tx.prepare_cached(
        r#"
        INSERT INTO empire (
            gamestate_id, country_id, name, is_player,
            capital_planet_id, owned_planet_count, controlled_planet_count,
            military_power, economy_power, tech_power
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )?;

    for row in &projection.rows {
        stmt.execute(params![
            gamestate_id,
            row.country_id,
            row.name,
            row.is_player,
            row.capital_planet_id,
            row.owned_planets.len() as i64,
            row.controlled_planet_count as i64,
            row.military_power,
            row.economy_power,
            row.tech_power,
        ])?;
    }

    if projection.rows.iter().all(|row| !row.is_player) {
        info!(gamestate_id, "No empire flagged as player");
    }
    debug!(
        gamestate_id,
        inserted = projection.rows.len(),
        skipped = projection.skipped,
        "Populated empire table"
    );

    let index = index(&projection.rows);
    Ok((
        ExtractStats {
            inserted: projection.rows.len(),
            skipped: projection.skipped,
        },
        index,
    ))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
