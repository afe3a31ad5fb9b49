//! Diplomatic relations from the player's point of view.
//!
//! Reads `country.<player>.relations_manager.relation`, which appears as a
//! list, as a map keyed by synthetic ids, or as a single relation block.
//! Entries may be wrapped once under `value`. A relation is only written
//! when both endpoints are persisted empires.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, Transaction};
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use super::{canonical_country_id, one_or_many, player_country, EmpireIndex, ExtractStats, Projection};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct ModifierShape {
    modifier: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RelationShape {
    country: Number,
    relation_current: Option<f64>,
    trust: Option<f64>,
    threat: Option<f64>,
    hostile: Option<bool>,
    border_range: Option<f64>,
    contact: Option<bool>,
    communications: Option<bool>,
    #[serde(default, deserialize_with = "one_or_many")]
    modifier: Vec<ModifierShape>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationRow {
    pub target_country_id: String,
    pub opinion: Option<f64>,
    pub trust: Option<f64>,
    pub threat: Option<f64>,
    pub is_hostile: bool,
    pub border_range: Option<f64>,
    pub has_contact: bool,
    pub has_communications: bool,
    /// Summed value per modifier type.
    pub modifiers: BTreeMap<String, f64>,
}

/// Player relations gated on `empires`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationProjection {
    pub source_country_id: String,
    pub relations: Projection<RelationRow>,
}

fn relation_entries(raw: &Value) -> Vec<&Value> {
    match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(fields) if fields.contains_key("country") => vec![raw],
        Value::Object(fields) => fields.values().collect(),
        _ => Vec::new(),
    }
}

fn unwrap_value(entry: &Value) -> &Value {
    match entry {
        Value::Object(fields) => fields.get("value").unwrap_or(entry),
        _ => entry,
    }
}

/// Project the player's relations. `None` when the extractor soft-fails.
pub fn project(doc: &Value, empires: &EmpireIndex) -> Option<RelationProjection> {
    let player = player_country(doc, "relation")?;

    let raw = player
        .record
        .get("relations_manager")
        .and_then(|manager| manager.get("relation"))
        .filter(|raw| !raw.is_null());
    let Some(raw) = raw else {
        info!(player_country_id = %player.country_id, "Relations data not found, skipping diplomatic relation population");
        return None;
    };

    if !empires.contains(&player.country_id) {
        warn!(player_country_id = %player.country_id, "Player empire not persisted, skipping diplomatic relation population");
        return None;
    }

    let mut relations = Projection::default();
    let mut seen = BTreeSet::new();

    for entry in relation_entries(raw) {
        let relation = match RelationShape::deserialize(unwrap_value(entry)) {
            Ok(relation) => relation,
            Err(e) => {
                debug!(error = %e, "Skipping relation with invalid schema");
                relations.skipped += 1;
                continue;
            }
        };

        let Some(target) = canonical_country_id(&Value::Number(relation.country)) else {
            relations.skipped += 1;
            continue;
        };
        if !empires.contains(&target) {
            debug!(target_country_id = %target, "Target empire not persisted, skipping relation");
            relations.skipped += 1;
            continue;
        }
        if !seen.insert(target.clone()) {
            debug!(target_country_id = %target, "Duplicate relation target, keeping first");
            relations.skipped += 1;
            continue;
        }

        let mut modifiers = BTreeMap::new();
        for modifier in relation.modifier {
            *modifiers.entry(modifier.modifier).or_insert(0.0) += modifier.value;
        }

        relations.rows.push(RelationRow {
            target_country_id: target,
            opinion: relation.relation_current,
            trust: relation.trust,
            threat: relation.threat,
            is_hostile: relation.hostile.unwrap_or(false),
            border_range: relation.border_range,
            has_contact: relation.contact.unwrap_or(false),
            has_communications: relation.communications.unwrap_or(false),
            modifiers,
        });
    }

    Some(RelationProjection {
        source_country_id: player.country_id,
        relations,
    })
}

/// Write relations and their opinion modifiers for `gamestate_id`.
pub fn populate(
    tx: &Transaction<'_>,
    gamestate_id: i64,
    doc: &Value,
    empires: &EmpireIndex,
) -> Result<ExtractStats, Error> {
    let Some(projection) = project(doc, empires) else {
        return Ok(ExtractStats::default());
    };

    let mut insert_relation = tx.prepare_cached(
        r#"
        INSERT INTO diplomatic_relation (
            gamestate_id, source_country_id, target_country_id,
            opinion, trust, threat, is_hostile, border_range,
            has_contact, has_communications
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )?;
    let mut insert_modifier = tx.prepare_cached(
        "INSERT INTO opinion_modifier (diplomatic_relation_id, modifier_type, value) VALUES (?1, ?2, ?3)",
    )?;

    let mut modifier_count = 0;
    for row in &projection.relations.rows {
        insert_relation.execute(params![
            gamestate_id,
            projection.source_country_id,
            row.target_country_id,
            row.opinion,
            row.trust,
            row.threat,
            row.is_hostile,
            row.border_range,
            row.has_contact,
            row.has_communications,
        ])?;
        let relation_id = tx.last_insert_rowid();

        for (modifier_type, value) in &row.modifiers {
            insert_modifier.execute(params![relation_id, modifier_type, value])?;
            modifier_count += 1;
        }
    }

    let stats = ExtractStats {
        inserted: projection.relations.rows.len(),
        skipped: projection.relations.skipped,
    };
    debug!(
        gamestate_id,
        inserted = stats.inserted,
        skipped = stats.skipped,
        modifiers = modifier_count,
        "Populated diplomatic relation tables"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::extract::empire;
    use crate::extract::tests::{count, gamestate_db};

    fn doc_with_relations(relation: Value) -> Value {
        json!({
            "player": [{ "country": 0 }],
            "country": {
                "0": { "name": "Us", "relations_manager": { "relation": relation } },
                "1": { "name": "Them" },
                "2": { "name": "Others" }
            }
        })
    }

    fn run(doc: &Value) -> (crate::db::Database, ExtractStats) {
        let (mut db, gamestate_id) = gamestate_db();
        let tx = db.transaction().unwrap();
        let (_, empires) = empire::populate(&tx, gamestate_id, doc).unwrap();
        let stats = populate(&tx, gamestate_id, doc, &empires).unwrap();
        tx.commit().unwrap();
        (db, stats)
    }

    #[test]
    fn test_modifiers_summed_by_type() {
        let doc = doc_with_relations(json!([{
            "country": 1,
            "relation_current": -20,
            "hostile": true,
            "modifier": [
                { "modifier": "opinion_declared_war", "value": 10 },
                { "modifier": "opinion_declared_war", "value": -5 },
                { "modifier": "opinion_insulted", "value": -30 }
            ]
        }]));

        let (db, stats) = run(&doc);
        assert_eq!(stats.inserted, 1);

        let value: f64 = db
            .conn()
            .query_row(
                "SELECT value FROM opinion_modifier WHERE modifier_type = 'opinion_declared_war'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, 5.0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM opinion_modifier"), 2);

        let (opinion, hostile, contact): (Option<f64>, bool, bool) = db
            .conn()
            .query_row(
                "SELECT opinion, is_hostile, has_contact FROM diplomatic_relation",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(opinion, Some(-20.0));
        assert!(hostile);
        assert!(!contact);
    }

    #[test]
    fn test_unknown_target_dropped() {
        let doc = doc_with_relations(json!([{ "country": 1 }, { "country": 99 }]));
        let (db, stats) = run(&doc);
        assert_eq!(stats, ExtractStats { inserted: 1, skipped: 1 });
        assert_eq!(count(&db, "SELECT COUNT(*) FROM diplomatic_relation WHERE target_country_id = '99'"), 0);
    }

    #[test]
    fn test_keyed_and_wrapped_relations() {
        let doc = doc_with_relations(json!({
            "a": { "value": { "country": 1, "trust": 12 } },
            "b": { "country": 2, "communications": true }
        }));
        let empires = empire::index(&empire::project(&doc).unwrap().rows);
        let projection = project(&doc, &empires).unwrap();
        let targets: Vec<&str> = projection
            .relations
            .rows
            .iter()
            .map(|row| row.target_country_id.as_str())
            .collect();
        assert_eq!(projection.source_country_id, "0");
        assert_eq!(targets, vec!["1", "2"]);
        assert_eq!(projection.relations.rows[0].trust, Some(12.0));
        assert!(projection.relations.rows[1].has_communications);
    }

    #[test]
    fn test_single_relation_block() {
        let doc = doc_with_relations(json!({
            "country": 2,
            "modifier": { "modifier": "opinion_good_relations", "value": 15 }
        }));
        let (db, stats) = run(&doc);
        assert_eq!(stats.inserted, 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM opinion_modifier"), 1);
    }

    #[test]
    fn test_invalid_and_duplicate_entries_skipped() {
        let doc = doc_with_relations(json!([
            { "country": "1" },
            { "trust": 3 },
            { "country": 2, "trust": 1 },
            { "country": 2, "trust": 2 }
        ]));
        let (db, stats) = run(&doc);
        assert_eq!(stats, ExtractStats { inserted: 1, skipped: 3 });
        let trust: f64 = db
            .conn()
            .query_row("SELECT trust FROM diplomatic_relation", [], |row| row.get(0))
            .unwrap();
        assert_eq!(trust, 1.0);
    }

    #[test]
    fn test_missing_relations_soft_fail() {
        let doc = json!({
            "player": [{ "country": 0 }],
            "country": { "0": { "name": "Us" } }
        });
        let (db, stats) = run(&doc);
        assert_eq!(stats, ExtractStats::default());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM diplomatic_relation"), 0);
    }

    #[test]
    fn test_player_not_persisted() {
        let doc = doc_with_relations(json!([{ "country": 1 }]));
        assert!(project(&doc, &EmpireIndex::default()).is_none());
    }
}
