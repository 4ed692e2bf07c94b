//! Incremental ingest of DSpace item edit events.
//!
//! DSpace writes one audit line per `update_item` call into its rolling
//! application logs. This crate reads those logs incrementally, remembers how
//! far each file has been read, and stores every event exactly once:
//!
//! - [`matcher`] recognizes the audit line
//! - [`reader`] resumes a file at its cursor and collects candidate events
//! - [`pipeline`] drives all matching files and commits events and cursor
//!   per file in one transaction
//!
//! Re-reading a byte range (after a crash between read and commit, or an
//! overlapping run) is harmless: every event carries a dedup key derived from
//! the file identity, its byte offset and the raw line, and the store ignores
//! keys it already has.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dashboard_db::DashboardDb;
//! use dashboard_ingest::{IngestConfig, IngestPipeline};
//!
//! let db = DashboardDb::open(&db_config).await?;
//! let report = IngestPipeline::new(db, IngestConfig::default()).run().await?;
//! for file in &report.files {
//!     println!("{}", file);
//! }
//! println!("{}", report.totals());
//! ```

pub mod config;
pub mod discover;
pub mod error;
pub mod file_identity;
pub mod lock;
pub mod matcher;
pub mod pipeline;
pub mod reader;

pub use config::{
    database_url_from_properties, resolve_database_config, DspaceProperties, IngestConfig,
    DEFAULT_DSPACE_CONFIG_PATH, DEFAULT_LOG_GLOB, DEFAULT_PARSER_ID,
};
pub use error::{IngestError, Result};
pub use file_identity::{FileIdentity, FileIdentityProvider, IdentityStrength, MetadataIdentity};
pub use matcher::{match_line, ItemUpdate};
pub use pipeline::{FileReport, FileState, FileStats, IngestPipeline, RunReport, RunTotals};
pub use reader::{read_from_cursor, resolve_start_offset, FileScan};
