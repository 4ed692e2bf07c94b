//! DSpace repository dashboard command line.
//!
//! - `ingest-edits`: incremental import of item edit events from DSpace logs,
//!   meant to be run by cron or a systemd timer
//! - `editors`: editor activity for a year or month

use clap::{Parser, Subcommand};
use dashboard_logging::{init_logging, LogConfig};
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "dashboard", about = "DSpace repository dashboard tools")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse DSpace logs and persist item update events per user
    IngestEdits(cli::ingest::IngestArgs),

    /// Editors ranked by distinct items edited in a period
    Editors(cli::editors::EditorsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "dashboard",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    let result = match cli.command {
        Commands::IngestEdits(args) => cli::ingest::run(args),
        Commands::Editors(args) => cli::editors::run(args).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}
