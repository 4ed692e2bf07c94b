//! Relational store for the repository dashboard.
//!
//! The dashboard reads DSpace's own tables elsewhere but only ever writes the
//! two tables defined here: deduplicated item edit events and per-file parser
//! cursors. This crate is the only place that talks SQL to them.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dashboard_db::{cursor_store, event_store, DashboardDb, DbConfig};
//!
//! let db = DashboardDb::open(&DbConfig::from_url(url)?).await?;
//!
//! let mut tx = db.begin().await?;
//! let cursor = cursor_store::load(&mut *tx, "dspace_item_edits", path).await?;
//! let inserted = event_store::insert_if_new(&mut *tx, &event).await?;
//! cursor_store::save(&mut *tx, "dspace_item_edits", path, identity, end).await?;
//! tx.commit().await?;
//! ```

mod error;
mod pool;
mod reports;
mod schema;
mod types;

pub mod cursor_store;
pub mod event_store;

pub use error::{DbError, Result};
pub use pool::{
    create_pool, redact_url, DatabaseType, Db, DbConfig, DbConnection, DbPool, DbRow,
    DbTransaction,
};
pub use schema::{EDIT_EVENTS_TABLE, PARSER_STATE_TABLE};
pub use types::*;

#[cfg(feature = "sqlite")]
use std::path::Path;
use tracing::info;

/// Handle on the dashboard database.
#[derive(Clone)]
pub struct DashboardDb {
    pool: DbPool,
}

impl DashboardDb {
    /// Connect and create the dashboard tables if they don't exist.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        let db = Self { pool };
        db.ensure_schema().await?;

        info!(backend = %config.db_type, "Dashboard database opened");
        Ok(db)
    }

    /// Open or create a SQLite database file.
    #[cfg(feature = "sqlite")]
    pub async fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Self::open(&DbConfig::sqlite(path.display().to_string())).await
    }

    /// Open a private in-memory database (for testing).
    #[cfg(feature = "sqlite")]
    pub async fn open_memory() -> Result<Self> {
        Self::open(&DbConfig::sqlite_memory()).await
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<DbTransaction> {
        Ok(self.pool.begin().await?)
    }

    /// Get the underlying connection pool (escape hatch for tests and
    /// one-off queries).
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("dashboard.db");

        let db = DashboardDb::open_sqlite(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("dashboard.db");

        DashboardDb::open_sqlite(&db_path).await.unwrap().close().await;
        let db = DashboardDb::open_sqlite(&db_path).await.unwrap();
        assert_eq!(event_store::count(db.pool()).await.unwrap(), 0);
    }
}
