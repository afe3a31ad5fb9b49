//! Offline verification commands. Both return a process exit code.

use crate::config::Config;
use crate::db::Database;
use crate::error::Error;
use crate::verify::{validate_budget_schema, verify_row_counts};

/// Run the verify command.
pub fn run(config: &Config, gamestate_ids: &[i64]) -> Result<i32, Error> {
    let db = Database::open(&config.database.path)?;
    let report = verify_row_counts(&db, gamestate_ids)?;

    println!("Gamestates verified: {}", report.verified);
    if report.is_ok() {
        println!("All row counts match expected values.");
        return Ok(0);
    }

    println!("Mismatches: {}", report.mismatches.len());
    for m in &report.mismatches {
        println!(
            "  gamestate {}, {}: expected {}, actual {}",
            m.gamestate_id, m.table, m.expected, m.actual
        );
    }
    Ok(1)
}

/// Run the validate-budget-schema command.
pub fn budget_schema(config: &Config, limit: usize) -> Result<i32, Error> {
    let db = Database::open(&config.database.path)?;
    let report = validate_budget_schema(&db, limit)?;

    println!("Documents with a budget: {}", report.documents);
    println!("Budget entry fields seen: {}", report.fields.len());
    println!("Budget category names seen: {}", report.category_names.len());
    println!("Columns in budget_entry: {}", report.columns.len());

    if report.is_ok() {
        println!("All budget entry fields have a database column.");
        return Ok(0);
    }

    println!("Missing columns in budget_entry:");
    for column in &report.missing_columns {
        println!("  - {}", column);
    }
    Ok(1)
}
