//! Projection of a decoded gamestate into relational rows.
//!
//! Every extractor is split in two: a pure `project` that walks the document
//! and validates records against typed shapes, and a `populate` that writes
//! the projected rows inside the ingestion transaction. The verifier reuses
//! the projections to recompute expected row counts.
//!
//! Shape failures are soft: they are logged and the record (or the whole
//! extractor) is skipped. Database errors are hard and roll back the
//! ingestion.
//!
//! Extractors run in a fixed order because later steps are gated on earlier
//! results: [`empire`] yields an [`EmpireIndex`] used by [`relation`], and
//! [`coordinate`] yields a [`CoordinateIndex`] used by [`empire_planet`].

pub mod budget;
pub mod coordinate;
pub mod empire;
pub mod empire_planet;
pub mod relation;

use std::collections::{BTreeMap, BTreeSet};

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

/// Rows written and records skipped by one extractor run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Rows projected from a collection, plus the number of records that failed
/// validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for Projection<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: 0,
        }
    }
}

/// Canonical string form of a country id. Numbers render in decimal,
/// integral floats drop their fraction.
pub fn canonical_country_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_i64() {
                Some(n.to_string())
            } else if let Some(n) = number.as_u64() {
                Some(n.to_string())
            } else {
                let f = number.as_f64()?;
                if f.fract() == 0.0 && f.is_finite() {
                    Some(format!("{f:.0}"))
                } else {
                    Some(f.to_string())
                }
            }
        }
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

/// Country id accepted as either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountryId(pub String);

impl<'de> Deserialize<'de> for CountryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        canonical_country_id(&value)
            .map(CountryId)
            .ok_or_else(|| D::Error::custom("expected a numeric or string country id"))
    }
}

/// Deserialize a list that may also appear as an empty block or as a single
/// unwrapped element.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| T::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Object(fields) if fields.is_empty() => Ok(Vec::new()),
        single => T::deserialize(single)
            .map(|item| vec![item])
            .map_err(D::Error::custom),
    }
}

/// Resolved player country id, if the document records one.
///
/// Only the first `player` entry counts. Missing or malformed player data
/// yields `None`.
pub fn player_country_id(doc: &Value) -> Option<String> {
    doc.get("player")
        .and_then(Value::as_array)
        .and_then(|players| players.first())
        .and_then(|player| player.get("country"))
        .and_then(canonical_country_id)
}

/// The player's country record, located through `player[0].country`.
pub(crate) struct PlayerCountry<'a> {
    pub country_id: String,
    pub record: &'a Map<String, Value>,
}

/// Locate the player's country, logging why when it cannot be found.
pub(crate) fn player_country<'a>(doc: &'a Value, extractor: &'static str) -> Option<PlayerCountry<'a>> {
    let players = doc.get("player").and_then(Value::as_array);
    let countries = doc.get("country").and_then(Value::as_object);
    let (Some(players), Some(countries)) = (players, countries) else {
        warn!(extractor, "Gamestate validation failed (player list or country map), skipping");
        return None;
    };
    if players.is_empty() {
        warn!(extractor, "Gamestate validation failed (empty player list), skipping");
        return None;
    }

    let Some(country_id) = player_country_id(doc) else {
        warn!(extractor, "Player country ID not found, skipping");
        return None;
    };

    match countries.get(&country_id).and_then(Value::as_object) {
        Some(record) => Some(PlayerCountry { country_id, record }),
        None => {
            warn!(extractor, player_country_id = %country_id, "Player country data not found, skipping");
            None
        }
    }
}

/// Empires persisted for one gamestate, with their owned planet lists.
#[derive(Debug, Default, Clone)]
pub struct EmpireIndex {
    owned_planets: BTreeMap<String, Vec<i64>>,
}

impl EmpireIndex {
    pub fn insert(&mut self, country_id: String, owned_planets: Vec<i64>) {
        self.owned_planets.insert(country_id, owned_planets);
    }

    pub fn contains(&self, country_id: &str) -> bool {
        self.owned_planets.contains_key(country_id)
    }

    pub fn owned_planets(&self) -> impl Iterator<Item = (&str, &[i64])> {
        self.owned_planets
            .iter()
            .map(|(country_id, planets)| (country_id.as_str(), planets.as_slice()))
    }
}

/// Planets with a persisted coordinate row for one gamestate.
#[derive(Debug, Default, Clone)]
pub struct CoordinateIndex {
    planets: BTreeSet<i64>,
}

impl CoordinateIndex {
    pub fn insert(&mut self, planet_id: i64) -> bool {
        self.planets.insert(planet_id)
    }

    pub fn contains(&self, planet_id: i64) -> bool {
        self.planets.contains(&planet_id)
    }
}
