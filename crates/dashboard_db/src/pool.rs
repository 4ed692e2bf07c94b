//! Database pool creation.
//!
//! This module provides compile-time database selection via feature flags.
//! Unlike `sqlx::AnyPool`, we use concrete pool types which keeps full
//! `Encode`/`Decode` support for chrono types on both backends.
//!
//! # Feature Priority
//!
//! - `sqlite` feature (default): Uses `SqlitePool`
//! - `postgres` feature: Uses `PgPool` (the DSpace production database)
//!
//! If both features are enabled, `sqlite` wins; build the production binary
//! with `--no-default-features --features postgres`.

use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::error::{DbError, Result};

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("dashboard_db needs either the 'sqlite' or the 'postgres' feature");

/// The sqlx database driver selected at compile time.
#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Db = sqlx::Postgres;

/// Database pool type alias.
pub type DbPool = sqlx::Pool<Db>;

/// A single live connection (what a transaction derefs to).
pub type DbConnection = <Db as sqlx::Database>::Connection;

/// An open transaction borrowed from the pool.
pub type DbTransaction = sqlx::Transaction<'static, Db>;

/// Database row type for queries.
pub type DbRow = <Db as sqlx::Database>::Row;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Sqlite,
    Postgres,
}

impl DatabaseType {
    /// Detect the backend from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("sqlite:") {
            Some(DatabaseType::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(DatabaseType::Postgres)
        } else {
            None
        }
    }

    /// Backend compiled into this build.
    pub fn compiled() -> Self {
        #[cfg(feature = "sqlite")]
        {
            DatabaseType::Sqlite
        }
        #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
        {
            DatabaseType::Postgres
        }
    }

    fn feature_name(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "SQLite"),
            DatabaseType::Postgres => write!(f, "PostgreSQL"),
        }
    }
}

/// Database configuration.
#[derive(Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Detected database type
    pub db_type: DatabaseType,
    /// Maximum connections in the pool
    pub max_connections: u32,
    /// How long to wait for a connection before failing
    pub acquire_timeout: Duration,
}

impl fmt::Debug for DbConfig {
    // The URL may carry a password.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("db_type", &self.db_type)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl DbConfig {
    /// Create SQLite configuration for a database file (created if missing).
    pub fn sqlite(path: impl AsRef<str>) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path.as_ref()),
            db_type: DatabaseType::Sqlite,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Create in-memory SQLite configuration (for testing).
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            db_type: DatabaseType::Sqlite,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration from a URL, auto-detecting database type.
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let db_type = DatabaseType::from_url(&url)
            .ok_or_else(|| DbError::InvalidUrl(redact_url(&url)))?;

        Ok(Self {
            url,
            db_type,
            max_connections: match db_type {
                DatabaseType::Sqlite => 5,
                DatabaseType::Postgres => 10,
            },
            acquire_timeout: Duration::from_secs(30),
        })
    }

    /// Set maximum connections.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn is_memory(&self) -> bool {
        self.url.starts_with("sqlite::memory:")
    }
}

/// Create a database pool from configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The database type isn't compiled in
/// - Connection fails
pub async fn create_pool(config: &DbConfig) -> Result<DbPool> {
    let compiled = DatabaseType::compiled();
    if config.db_type != compiled {
        return Err(DbError::NotCompiled(
            config.db_type.to_string(),
            config.db_type.feature_name().to_string(),
        ));
    }

    let mut options = sqlx::pool::PoolOptions::<Db>::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    // An in-memory database lives exactly as long as its one connection.
    if config.is_memory() {
        options = options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = options.connect(&config.url).await?;

    #[cfg(feature = "sqlite")]
    apply_sqlite_optimizations(&pool, config.is_memory()).await?;

    info!("Connected to {} database", config.db_type);
    Ok(pool)
}

/// Apply SQLite-specific optimizations.
#[cfg(feature = "sqlite")]
async fn apply_sqlite_optimizations(pool: &DbPool, in_memory: bool) -> Result<()> {
    if !in_memory {
        // WAL mode for better concurrent access with dashboard readers
        sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    }

    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;

    Ok(())
}

/// Strip credentials from a URL before it goes into an error or a log line.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
