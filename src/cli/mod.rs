//! CLI commands for stellaris-stats.

pub mod dump;
pub mod run;
pub mod saves;
pub mod verify;
