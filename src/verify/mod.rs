//! Offline consistency checks over stored gamestates.
//!
//! - [`row_counts`]: recompute expected rows per table from the stored raw
//!   document and compare with what was persisted.
//! - [`budget_schema`]: report budget fields seen in documents that have no
//!   `budget_entry` column.

pub mod budget_schema;
pub mod row_counts;

pub use budget_schema::{validate_budget_schema, BudgetSchemaReport};
pub use row_counts::{expected_counts, verify_row_counts, Mismatch, VerifyReport};
