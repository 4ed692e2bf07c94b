//! `ingest-edits`: one incremental pass over the DSpace logs.
//!
//! Prints one line per file and a final `Done:` line. The exit status is 0
//! even when a file failed (the failure is in the output and the file is
//! retried next run) unless `--fail-on-error` is given.

use anyhow::Result;
use clap::Args;
use dashboard_ingest::{IngestConfig, IngestPipeline, RunReport, DEFAULT_LOG_GLOB, DEFAULT_PARSER_ID};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use super::{runtime, DatabaseArgs};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Glob for DSpace log files
    #[arg(long, env = "DSPACE_EDIT_LOG_GLOB", default_value = DEFAULT_LOG_GLOB)]
    pub log_glob: String,

    /// Parser state key for incremental reads
    #[arg(long, default_value = DEFAULT_PARSER_ID)]
    pub parser_name: String,

    /// Parse and report without writing to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Refuse to start while another run with the same parser name holds a
    /// lock in this directory
    #[arg(long)]
    pub lock_dir: Option<PathBuf>,

    /// Exit with status 1 if any file failed
    #[arg(long)]
    pub fail_on_error: bool,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

impl IngestArgs {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            log_glob: self.log_glob.clone(),
            parser_id: self.parser_name.clone(),
            dry_run: self.dry_run,
            lock_dir: self.lock_dir.clone(),
        }
    }
}

pub fn run(args: IngestArgs) -> Result<ExitCode> {
    let rt = runtime()?;
    let report = rt.block_on(async {
        let db = args.db.open().await?;
        let pipeline = IngestPipeline::new(db.clone(), args.ingest_config());
        let report = pipeline.run().await;
        db.close().await;
        Ok::<_, anyhow::Error>(report?)
    })?;

    print_report(&report);

    if args.fail_on_error && report.has_failures() {
        info!("Exiting with failure status: at least one file failed");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport) {
    if report.is_empty() {
        println!("No files matched: {}", report.log_glob);
        return;
    }

    for file in &report.files {
        println!("{}", file);
    }
    println!("{}", report.totals());
    if report.dry_run {
        println!("Dry run: nothing was written");
    }
}
