//! Subcommands and the pieces they share.

pub mod editors;
pub mod ingest;

use anyhow::{Context, Result};
use clap::Args;
use dashboard_db::{redact_url, DashboardDb};
use dashboard_ingest::{resolve_database_config, DEFAULT_DSPACE_CONFIG_PATH};
use std::path::PathBuf;

/// Where the dashboard tables live.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database URL (sqlite:<path> or postgres://...); overrides local.cfg
    #[arg(long, env = "DASHBOARD_DATABASE_URL")]
    pub database_url: Option<String>,

    /// DSpace local.cfg to take db.url/db.username/db.password from
    #[arg(long, env = "DSPACE_CONFIG_PATH", default_value = DEFAULT_DSPACE_CONFIG_PATH)]
    pub dspace_config: PathBuf,
}

impl DatabaseArgs {
    /// Resolve the connection settings and open the database.
    pub async fn open(&self) -> Result<DashboardDb> {
        let config = resolve_database_config(self.database_url.as_deref(), &self.dspace_config)?;
        DashboardDb::open(&config)
            .await
            .with_context(|| format!("Failed to open database {}", redact_url(&config.url)))
    }
}

/// Runtime for the sqlx calls. All work is sequential, one thread is enough.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
