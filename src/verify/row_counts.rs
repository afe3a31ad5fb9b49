//! Row-count verification.
//!
//! Expected counts are recomputed straight from the stored document with
//! their own validation rules, independent of the extractor projections, so
//! a gating regression in an extractor shows up as a mismatch.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::db::{Database, RowCounts, BUDGET_RESOURCE_COLUMNS, EXTRACTED_TABLES};
use crate::error::Error;
use crate::extract::canonical_country_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub gamestate_id: i64,
    pub table: &'static str,
    pub expected: i64,
    pub actual: i64,
}

#[derive(Debug, Default, Clone)]
pub struct VerifyReport {
    pub verified: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn number_or_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null | Value::Number(_)))
}

fn integer_or_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(value) => value.as_i64().is_some(),
    }
}

fn bool_or_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null | Value::Bool(_)))
}

/// Items of a lenient list field, or `None` when the field is malformed.
fn list_items(value: Option<&Value>) -> Option<Vec<&Value>> {
    match value {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => Some(items.iter().collect()),
        Some(Value::Object(fields)) if fields.is_empty() => Some(Vec::new()),
        Some(single) => Some(vec![single]),
    }
}

fn integer_list(value: Option<&Value>) -> Option<Vec<i64>> {
    list_items(value)?.into_iter().map(Value::as_i64).collect()
}

/// Planet ids with a well-formed `coordinate` block.
fn planets_with_coordinates(doc: &Value) -> Vec<i64> {
    let Some(planets) = doc.pointer("/planets/planet").and_then(Value::as_object) else {
        return Vec::new();
    };
    planets
        .iter()
        .filter_map(|(key, planet)| {
            let coordinate = planet.get("coordinate")?.as_object()?;
            let valid = coordinate.get("x").is_some_and(Value::is_number)
                && coordinate.get("y").is_some_and(Value::is_number)
                && integer_or_absent(coordinate.get("origin"));
            if valid {
                key.parse::<i64>().ok()
            } else {
                None
            }
        })
        .collect()
}

/// Owned planet ids of a country block that would be persisted, or `None`
/// when the block fails validation.
fn valid_country(country: &Value) -> Option<Vec<i64>> {
    let fields = country.as_object()?;
    let valid = integer_or_absent(fields.get("capital"))
        && integer_list(fields.get("controlled_planets")).is_some()
        && ["military_power", "economy_power", "tech_power"]
            .iter()
            .all(|key| number_or_absent(fields.get(*key)));
    if !valid {
        return None;
    }
    integer_list(fields.get("owned_planets"))
}

fn budget_entry_is_valid(entry: &Value) -> bool {
    entry.as_object().is_some_and(|fields| {
        BUDGET_RESOURCE_COLUMNS
            .iter()
            .all(|column| number_or_absent(fields.get(*column)))
    })
}

fn count_budget_entries(player: &Map<String, Value>) -> usize {
    let Some(month) = player
        .get("budget")
        .and_then(|budget| budget.get("current_month"))
        .and_then(Value::as_object)
    else {
        return 0;
    };
    ["income", "expenses", "balance"]
        .iter()
        .filter_map(|category_type| month.get(*category_type).and_then(Value::as_object))
        .flat_map(|categories| categories.values())
        .filter(|entry| budget_entry_is_valid(entry))
        .count()
}

/// Distinct modifier types of a relation block, or `None` when the block
/// fails validation.
fn valid_relation(relation: &Value) -> Option<(String, usize)> {
    let fields = relation.as_object()?;
    let target = match fields.get("country") {
        Some(country @ Value::Number(_)) => canonical_country_id(country)?,
        _ => return None,
    };
    let valid = ["relation_current", "trust", "threat", "border_range"]
        .iter()
        .all(|key| number_or_absent(fields.get(*key)))
        && ["hostile", "contact", "communications"]
            .iter()
            .all(|key| bool_or_absent(fields.get(*key)));
    if !valid {
        return None;
    }

    let mut modifier_types = BTreeSet::new();
    for modifier in list_items(fields.get("modifier"))? {
        let modifier_type = modifier.get("modifier")?.as_str()?;
        modifier.get("value").filter(|value| value.is_number())?;
        modifier_types.insert(modifier_type);
    }
    Some((target, modifier_types.len()))
}

fn relation_blocks(raw: &Value) -> Vec<&Value> {
    let entries: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(fields) if fields.contains_key("country") => vec![raw],
        Value::Object(fields) => fields.values().collect(),
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .map(|entry| entry.get("value").unwrap_or(entry))
        .collect()
}

/// Rows ingestion should have written for `doc`.
pub fn expected_counts(doc: &Value) -> RowCounts {
    let coordinate_rows = planets_with_coordinates(doc);
    let coordinates: BTreeSet<i64> = coordinate_rows.iter().copied().collect();

    let mut empires = BTreeSet::new();
    let mut empire_planets = 0;
    if let Some(countries) = doc.get("country").and_then(Value::as_object) {
        for (country_id, country) in countries {
            let Some(owned) = valid_country(country) else {
                continue;
            };
            empires.insert(country_id.as_str());
            let owned: BTreeSet<i64> = owned.into_iter().collect();
            empire_planets += owned.iter().filter(|planet| coordinates.contains(planet)).count();
        }
    }

    let player = doc
        .get("player")
        .and_then(Value::as_array)
        .and_then(|players| players.first())
        .and_then(|player| player.get("country"))
        .and_then(canonical_country_id)
        .and_then(|id| {
            let record = doc.get("country")?.get(&id)?.as_object()?;
            Some((id, record))
        });

    let mut budget_entries = 0;
    let mut relations = 0;
    let mut modifiers = 0;
    if let Some((player_id, record)) = player {
        budget_entries = count_budget_entries(record);

        let raw = record
            .get("relations_manager")
            .and_then(|manager| manager.get("relation"))
            .filter(|raw| !raw.is_null());
        if let (Some(raw), true) = (raw, empires.contains(player_id.as_str())) {
            let mut targets = BTreeSet::new();
            for (target, modifier_types) in relation_blocks(raw).into_iter().filter_map(valid_relation) {
                if empires.contains(target.as_str()) && targets.insert(target) {
                    relations += 1;
                    modifiers += modifier_types;
                }
            }
        }
    }

    let mut counts = RowCounts::new();
    counts.insert("budget_category", budget_entries as i64);
    counts.insert("budget_entry", budget_entries as i64);
    counts.insert("planet_coordinate", coordinate_rows.len() as i64);
    counts.insert("empire", empires.len() as i64);
    counts.insert("empire_planet", empire_planets as i64);
    counts.insert("diplomatic_relation", relations as i64);
    counts.insert("opinion_modifier", modifiers as i64);
    counts
}

/// Compare expected and persisted counts for `gamestate_ids`, or for every
/// stored gamestate when the list is empty.
pub fn verify_row_counts(db: &Database, gamestate_ids: &[i64]) -> Result<VerifyReport, Error> {
    let ids = if gamestate_ids.is_empty() {
        db.list_gamestate_ids()?
    } else {
        gamestate_ids.to_vec()
    };
    info!(gamestates = ids.len(), "Verifying row counts");

    let mut report = VerifyReport::default();
    for gamestate_id in ids {
        let doc = db.load_gamestate_data(gamestate_id)?;
        let expected = expected_counts(&doc);
        let actual = db.count_rows(gamestate_id)?;

        for table in EXTRACTED_TABLES {
            let expected = expected.get(table).copied().unwrap_or(0);
            let actual = actual.get(table).copied().unwrap_or(0);
            if expected != actual {
                report.mismatches.push(Mismatch {
                    gamestate_id,
                    table,
                    expected,
                    actual,
                });
            }
        }
        report.verified += 1;
        debug!(gamestate_id, "Verified gamestate");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::date::GameDate;
    use crate::db::insert_gamestate;
    use crate::ingest::populate_gamestate;

    fn document() -> Value {
        json!({
            "player": [{ "country": "0" }],
            "country": {
                "0": {
                    "owned_planets": [1, 2, 2],
                    "budget": { "current_month": { "income": { "a": { "energy": 1 }, "b": {} } } },
                    "relations_manager": { "relation": {
                        "x": { "value": { "country": 1, "modifier": [
                            { "modifier": "m", "value": 1 },
                            { "modifier": "m", "value": 2 },
                            { "modifier": "n", "value": 3 }
                        ] } },
                        "y": { "country": 9 }
                    } }
                },
                "1": { "owned_planets": [3] },
                "2": "none"
            },
            "planets": { "planet": {
                "1": { "coordinate": { "x": 0, "y": 0 } },
                "2": { "coordinate": { "x": 1, "y": 1 } },
                "3": {}
            } }
        })
    }

    #[test]
    fn test_expected_counts_apply_gating() {
        let counts = expected_counts(&document());
        assert_eq!(counts["budget_category"], 2);
        assert_eq!(counts["budget_entry"], 2);
        assert_eq!(counts["empire"], 2);
        assert_eq!(counts["diplomatic_relation"], 1);
        assert_eq!(counts["opinion_modifier"], 2);
        assert_eq!(counts["planet_coordinate"], 2);
        assert_eq!(counts["empire_planet"], 2);
    }

    #[test]
    fn test_expected_counts_reject_invalid_records() {
        let doc = json!({
            "player": [{ "country": 0 }],
            "country": {
                "0": {
                    "owned_planets": 1,
                    "budget": { "current_month": { "expenses": { "ok": { "alloys": null }, "bad": { "alloys": "x" } } } },
                    "relations_manager": { "relation": [
                        { "country": "1" },
                        { "country": 1, "hostile": 1 },
                        { "country": 1, "modifier": { "modifier": "m", "value": 1 } },
                        { "country": 1 },
                        { "country": 2 }
                    ] }
                },
                "1": { "capital": 2.5 },
                "2": { "military_power": "strong" },
                "3": { "controlled_planets": [1, "x"] }
            },
            "planets": { "planet": {
                "1": { "coordinate": { "x": 0, "y": 0, "origin": 4 } },
                "2": { "coordinate": { "x": "0", "y": 0 } },
                "sun": { "coordinate": { "x": 0, "y": 0 } }
            } }
        });

        let counts = expected_counts(&doc);
        assert_eq!(counts["budget_entry"], 1);
        assert_eq!(counts["empire"], 1);
        assert_eq!(counts["planet_coordinate"], 1);
        assert_eq!(counts["empire_planet"], 1);
        // Only country 0 passes validation, so no relation target is persisted.
        assert_eq!(counts["diplomatic_relation"], 0);
        assert_eq!(counts["opinion_modifier"], 0);
    }

    fn store(db: &mut Database, stored: &Value, extracted: &Value) -> i64 {
        let save_id = db.upsert_save("s", "S").unwrap();
        let tx = db.transaction().unwrap();
        let id = insert_gamestate(&tx, save_id, &GameDate::new(2200, 1, 1).unwrap(), stored).unwrap();
        populate_gamestate(&tx, id, extracted).unwrap();
        tx.commit().unwrap();
        id
    }

    fn stored_gamestate(db: &mut Database) -> i64 {
        let doc = document();
        store(db, &doc, &doc)
    }

    #[test]
    fn test_ingested_gamestate_verifies() {
        let mut db = Database::open_memory().unwrap();
        let id = stored_gamestate(&mut db);

        let report = verify_row_counts(&db, &[]).unwrap();
        assert_eq!(report.verified, 1);
        assert!(report.is_ok(), "{:?}", report.mismatches);

        let report = verify_row_counts(&db, &[id]).unwrap();
        assert!(report.is_ok());
    }

    #[test]
    fn test_missing_rows_reported() {
        let mut db = Database::open_memory().unwrap();
        let id = stored_gamestate(&mut db);
        db.conn()
            .execute("DELETE FROM empire_planet WHERE planet_id = 2", [])
            .unwrap();

        let report = verify_row_counts(&db, &[id]).unwrap();
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                gamestate_id: id,
                table: "empire_planet",
                expected: 2,
                actual: 1,
            }]
        );
    }

    #[test]
    fn test_extraction_drift_reported() {
        let stored = document();
        let mut extracted = document();
        extracted["planets"]["planet"]["3"] = json!({ "coordinate": { "x": 5, "y": 5 } });

        let mut db = Database::open_memory().unwrap();
        let id = store(&mut db, &stored, &extracted);

        let report = verify_row_counts(&db, &[id]).unwrap();
        assert_eq!(
            report.mismatches,
            vec![
                Mismatch {
                    gamestate_id: id,
                    table: "planet_coordinate",
                    expected: 2,
                    actual: 3,
                },
                Mismatch {
                    gamestate_id: id,
                    table: "empire_planet",
                    expected: 2,
                    actual: 3,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_gamestate() {
        let db = Database::open_memory().unwrap();
        assert!(matches!(
            verify_row_counts(&db, &[7]),
            Err(Error::GamestateNotFound(7))
        ));
    }
}
