//! Ingestion commands: the polling loop and a single iteration.

use crate::config::Config;
use crate::error::Error;
use crate::ingest::Ingestor;
use crate::scheduler::Scheduler;

/// Poll the save every configured interval until interrupted.
pub async fn run(config: &Config, save_name: &str) -> Result<(), Error> {
    let ingestor = Ingestor::from_config(config, save_name);
    if !ingestor.archive_path().exists() {
        return Err(Error::SaveNotFound(ingestor.archive_path().to_path_buf()));
    }

    Scheduler::new(ingestor, config.interval()).run().await;
    Ok(())
}

/// Run one ingestion iteration and report the outcome.
pub async fn ingest_once(config: &Config, save_name: &str) -> Result<(), Error> {
    let ingestor = Ingestor::from_config(config, save_name);

    match ingestor.run_iteration().await? {
        Some(event) => println!(
            "Created gamestate {} for save {} ({})",
            event.gamestate_id,
            event.save_id,
            event.date.to_iso()
        ),
        None => println!("Gamestate for this month already exists, nothing to do."),
    }
    Ok(())
}
