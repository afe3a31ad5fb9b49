//! stellaris-stats - Stellaris save ingestion into SQLite.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stellaris_stats::cli;
use stellaris_stats::config::Config;
use stellaris_stats::Error;

#[derive(Parser)]
#[command(name = "stellaris-stats")]
#[command(about = "Ingest Stellaris saves into monthly snapshots and relational tables")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.stellaris-stats/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a save and ingest one snapshot per in-game month
    Run {
        /// Save directory name under the data dir
        #[arg(long)]
        gamestate: String,
    },

    /// Run a single ingestion iteration
    Ingest {
        /// Save directory name under the data dir
        #[arg(long)]
        gamestate: String,
    },

    /// List save directories, or saves already ingested with --db
    ListSaves {
        #[arg(long)]
        db: bool,
    },

    /// Recompute expected row counts from stored documents and compare
    Verify {
        /// Only these gamestates (repeatable)
        #[arg(long = "gamestate-id")]
        gamestate_ids: Vec<i64>,
    },

    /// Report budget fields in stored documents that have no column
    ValidateBudgetSchema {
        /// Number of most recent documents to scan
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Write a gamestate as one JSON file per top-level key
    Dump {
        /// Save directory name under the data dir
        #[arg(long)]
        gamestate: String,

        /// Dump the stored snapshot of this date (YYYY-MM-DD) instead of the save file
        #[arg(long)]
        date: Option<String>,

        /// Base output directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    let directive = format!("stellaris_stats={}", config.log_level);
    let filter = match directive.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Run { gamestate }) => {
            cli::run::run(&config, &gamestate).await?;
        }
        Some(Commands::Ingest { gamestate }) => {
            cli::run::ingest_once(&config, &gamestate).await?;
        }
        Some(Commands::ListSaves { db }) => {
            cli::saves::run(&config, db)?;
        }
        Some(Commands::Verify { gamestate_ids }) => {
            let exit_code = cli::verify::run(&config, &gamestate_ids)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Some(Commands::ValidateBudgetSchema { limit }) => {
            let exit_code = cli::verify::budget_schema(&config, limit)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Some(Commands::Dump {
            gamestate,
            date,
            output,
        }) => {
            cli::dump::run(&config, &gamestate, date.as_deref(), output)?;
        }
    }

    Ok(())
}
