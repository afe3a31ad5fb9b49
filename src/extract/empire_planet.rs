//! Empire ownership links, gated on persisted coordinates.

use std::collections::BTreeSet;

use rusqlite::{params, Transaction};
use tracing::debug;

use super::{CoordinateIndex, EmpireIndex, ExtractStats};
use crate::error::Error;

/// `(country_id, planet_id)` pairs to link. Planets without a coordinate row
/// are counted as skipped; repeated planet ids are linked once.
pub fn project(empires: &EmpireIndex, coordinates: &CoordinateIndex) -> (Vec<(String, i64)>, usize) {
    let mut links = Vec::new();
    let mut skipped = 0;

    for (country_id, planets) in empires.owned_planets() {
        let mut seen = BTreeSet::new();
        for &planet_id in planets {
            if !seen.insert(planet_id) {
                continue;
            }
            if coordinates.contains(planet_id) {
                links.push((country_id.to_string(), planet_id));
            } else {
                skipped += 1;
            }
        }
    }
    (links, skipped)
}

/// Write `empire_planet` rows for `gamestate_id`.
pub fn link_empire_planets(
    tx: &Transaction<'_>,
    gamestate_id: i64,
    empires: &EmpireIndex,
    coordinates: &CoordinateIndex,
) -> Result<ExtractStats, Error> {
    let (links, skipped) = project(empires, coordinates);

    let mut stmt = tx.prepare_cached(
        "INSERT INTO empire_planet (gamestate_id, country_id, planet_id) VALUES (?1, ?2, ?3)",
    )?;
    for (country_id, planet_id) in &links {
        stmt.execute(params![gamestate_id, country_id, planet_id])?;
    }

    debug!(gamestate_id, inserted = links.len(), skipped, "Linked empire planets");
    Ok(ExtractStats {
        inserted: links.len(),
        skipped,
    })
}
