//! Stellaris save ingestion library.
//!
//! Reads `ironman.sav` archives, decodes the `gamestate` document, and
//! extracts budgets, empires, diplomatic relations and planet coordinates
//! into SQLite, one snapshot per in-game month.

pub mod archive;
pub mod cli;
pub mod config;
pub mod date;
pub mod db;
pub mod decoder;
pub mod error;
pub mod events;
pub mod extract;
pub mod ingest;
pub mod names;
pub mod scheduler;
pub mod verify;

pub use error::Error;
