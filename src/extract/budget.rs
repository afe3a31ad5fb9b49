//! Player budget ledger for the current month.
//!
//! `country.<player>.budget.current_month.<type>.<category>` holds one
//! resource vector per category name. Category names are open-ended; every
//! valid entry becomes one `budget_entry` row plus one `budget_category` row.

use rusqlite::{params, params_from_iter, Transaction};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{player_country, ExtractStats, Projection};
use crate::db::BUDGET_RESOURCE_COLUMNS;
use crate::error::Error;

/// Ledger sections under `current_month`.
pub const CATEGORY_TYPES: [&str; 3] = ["income", "expenses", "balance"];

/// One resource vector. Absent fields stay `None` and persist as NULL.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct BudgetEntry {
    pub alloys: Option<f64>,
    pub astral_threads: Option<f64>,
    pub consumer_goods: Option<f64>,
    pub energy: Option<f64>,
    pub engineering_research: Option<f64>,
    pub exotic_gases: Option<f64>,
    pub food: Option<f64>,
    pub influence: Option<f64>,
    pub minerals: Option<f64>,
    pub minor_artifacts: Option<f64>,
    pub nanites: Option<f64>,
    pub physics_research: Option<f64>,
    pub rare_crystals: Option<f64>,
    pub society_research: Option<f64>,
    pub sr_dark_matter: Option<f64>,
    pub sr_living_metal: Option<f64>,
    pub sr_zro: Option<f64>,
    pub trade: Option<f64>,
    pub unity: Option<f64>,
    pub volatile_motes: Option<f64>,
}

impl BudgetEntry {
    /// Values in [`BUDGET_RESOURCE_COLUMNS`] order.
    pub fn values(&self) -> [Option<f64>; 20] {
        [
            self.alloys,
            self.astral_threads,
            self.consumer_goods,
            self.energy,
            self.engineering_research,
            self.exotic_gases,
            self.food,
            self.influence,
            self.minerals,
            self.minor_artifacts,
            self.nanites,
            self.physics_research,
            self.rare_crystals,
            self.society_research,
            self.sr_dark_matter,
            self.sr_living_metal,
            self.sr_zro,
            self.trade,
            self.unity,
            self.volatile_motes,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRow {
    pub category_type: &'static str,
    pub category_name: String,
    pub entry: BudgetEntry,
}

/// `budget.current_month` of a country record.
pub fn current_month(record: &Map<String, Value>) -> Option<&Map<String, Value>> {
    record
        .get("budget")
        .and_then(|budget| budget.get("current_month"))
        .and_then(Value::as_object)
}

/// Project the player's budget. `None` when the extractor soft-fails.
pub fn project(doc: &Value) -> Option<Projection<BudgetRow>> {
    let player = player_country(doc, "budget")?;

    let Some(month) = current_month(player.record) else {
        info!(player_country_id = %player.country_id, "Budget data not found, skipping budget population");
        return None;
    };

    let mut projection = Projection::default();
    for category_type in CATEGORY_TYPES {
        let Some(categories) = month.get(category_type).and_then(Value::as_object) else {
            debug!(category_type, "Budget category type absent");
            continue;
        };

        for (category_name, raw) in categories {
            let parsed = match raw {
                Value::Object(_) => BudgetEntry::deserialize(raw).map_err(|e| e.to_string()),
                other => Err(format!("expected a resource block, found {other}")),
            };
            match parsed {
                Ok(entry) => projection.rows.push(BudgetRow {
                    category_type,
                    category_name: category_name.clone(),
                    entry,
                }),
                Err(error) => {
                    warn!(category_type, category_name = %category_name, %error, "Invalid budget entry, skipping");
                    projection.skipped += 1;
                }
            }
        }
    }
    Some(projection)
}

fn insert_entry_sql() -> String {
    let placeholders = (1..=BUDGET_RESOURCE_COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO budget_entry ({}) VALUES ({placeholders})",
        BUDGET_RESOURCE_COLUMNS.join(", ")
    )
}

/// Write the player's budget rows for `gamestate_id`.
pub fn populate(tx: &Transaction<'_>, gamestate_id: i64, doc: &Value) -> Result<ExtractStats, Error> {
    let Some(projection) = project(doc) else {
        return Ok(ExtractStats::default());
    };

    let mut insert_entry = tx.prepare_cached(&insert_entry_sql())?;
    let mut insert_category = tx.prepare_cached(
        r#"
        INSERT INTO budget_category (gamestate_id, category_type, category_name, budget_entry_id)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?;

    for row in &projection.rows {
        insert_entry.execute(params_from_iter(row.entry.values()))?;
        let budget_entry_id = tx.last_insert_rowid();
        insert_category.execute(params![
            gamestate_id,
            row.category_type,
            row.category_name,
            budget_entry_id
        ])?;
    }

    debug!(
        gamestate_id,
        inserted = projection.rows.len(),
        skipped = projection.skipped,
        "Populated budget tables"
    );
    Ok(ExtractStats {
        inserted: projection.rows.len(),
        skipped: projection.skipped,
    })
}
