//! Budget schema drift detection.
//!
//! The game adds resources and budget categories across patches. This scans
//! stored documents for every field used in the player's budget entries and
//! reports the ones `budget_entry` has no column for.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::info;

use crate::db::Database;
use crate::error::Error;
use crate::extract::budget::{current_month, CATEGORY_TYPES};
use crate::extract::player_country_id;

#[derive(Debug, Default, Clone)]
pub struct BudgetSchemaReport {
    /// Documents that carried a budget.
    pub documents: usize,
    pub fields: BTreeSet<String>,
    pub category_names: BTreeSet<String>,
    pub columns: Vec<String>,
    /// Fields seen in documents without a matching column.
    pub missing_columns: Vec<String>,
}

impl BudgetSchemaReport {
    pub fn is_ok(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

/// Collect budget field and category names from one document. Returns
/// `false` when the document has no player budget.
fn collect(doc: &Value, report: &mut BudgetSchemaReport) -> bool {
    let month = player_country_id(doc)
        .and_then(|id| doc.get("country")?.get(&id)?.as_object())
        .and_then(current_month);
    let Some(month) = month else {
        return false;
    };

    for category_type in CATEGORY_TYPES {
        let Some(categories) = month.get(category_type).and_then(Value::as_object) else {
            continue;
        };
        for (category_name, entry) in categories {
            report.category_names.insert(category_name.clone());
            if let Some(entry) = entry.as_object() {
                report.fields.extend(entry.keys().cloned());
            }
        }
    }
    true
}

/// Scan up to `limit` most recent documents against the live table.
pub fn validate_budget_schema(db: &Database, limit: usize) -> Result<BudgetSchemaReport, Error> {
    let mut report = BudgetSchemaReport {
        columns: db
            .budget_entry_columns()?
            .into_iter()
            .filter(|column| column != "budget_entry_id")
            .collect(),
        ..Default::default()
    };

    for (_, doc) in db.budget_documents(limit)? {
        if collect(&doc, &mut report) {
            report.documents += 1;
        }
    }

    report.missing_columns = report
        .fields
        .iter()
        .filter(|field| !report.columns.contains(field))
        .cloned()
        .collect();

    info!(
        documents = report.documents,
        fields = report.fields.len(),
        categories = report.category_names.len(),
        missing = report.missing_columns.len(),
        "Budget schema validated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::date::GameDate;
    use crate::db::insert_gamestate;

    fn store(db: &Database, month: u8, doc: Value) {
        let save_id = db.upsert_save("s", "S").unwrap();
        insert_gamestate(db.conn(), save_id, &GameDate::new(2200, month, 1).unwrap(), &doc).unwrap();
    }

    #[test]
    fn test_known_fields_pass() {
        let db = Database::open_memory().unwrap();
        store(
            &db,
            1,
            json!({
                "player": [{ "country": 0 }],
                "country": { "0": { "budget": { "current_month": {
                    "income": { "country_base": { "energy": 1, "unity": 2 } },
                    "expenses": { "ships": { "alloys": 3 } }
                } } } }
            }),
        );
        store(&db, 2, json!({ "country": {} }));

        let report = validate_budget_schema(&db, 100).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.documents, 1);
        assert_eq!(report.columns.len(), 20);
        assert_eq!(
            report.category_names.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["country_base", "ships"]
        );
    }

    #[test]
    fn test_new_resource_reported() {
        let db = Database::open_memory().unwrap();
        store(
            &db,
            1,
            json!({
                "player": [{ "country": "3" }],
                "country": { "3": { "budget": { "current_month": {
                    "balance": { "total": { "energy": 1, "zro_crystals": 4 } }
                } } } }
            }),
        );

        let report = validate_budget_schema(&db, 100).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.missing_columns, vec!["zro_crystals".to_string()]);
    }
}
