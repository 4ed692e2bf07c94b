//! Pipeline driver: enumerate log files, read each from its cursor, and
//! commit new events together with the advanced cursor.
//!
//! Files are independent units of work. Each one commits or rolls back as a
//! whole, and a failure is recorded in the run report without stopping the
//! files after it.

use dashboard_db::{cursor_store, event_store, DashboardDb, DbError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, debug_span, info, warn};

use crate::config::IngestConfig;
use crate::discover::discover_log_files;
use crate::error::{IngestError, Result};
use crate::file_identity::{FileIdentityProvider, IdentityStrength, MetadataIdentity};
use crate::lock::try_lock_run;
use crate::reader::read_from_cursor;

/// Where a file is in its unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    NotStarted,
    Reading,
    /// Events and cursor committed together
    Committed,
    /// Scanned in dry-run mode; nothing written
    DryRun,
    /// Rolled back; the stored cursor is unchanged
    Failed,
}

impl FileState {
    pub fn is_success(self) -> bool {
        matches!(self, FileState::Committed | FileState::DryRun)
    }
}

/// Counters for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub lines_scanned: u64,
    pub events_matched: u64,
    pub events_inserted: u64,
    pub start_offset: u64,
    pub end_offset: u64,
}

/// Outcome of one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub state: FileState,
    pub stats: FileStats,
    pub error: Option<String>,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: FAILED: {}", self.path.display(), error),
            None => write!(
                f,
                "{}: lines={}, parsed={}, inserted={}, offset={}->{}",
                self.path.display(),
                self.stats.lines_scanned,
                self.stats.events_matched,
                self.stats.events_inserted,
                self.stats.start_offset,
                self.stats.end_offset
            ),
        }
    }
}

/// Aggregate counters for a run. Failed files contribute only to `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub lines_scanned: u64,
    pub events_matched: u64,
    pub events_inserted: u64,
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done: files={}, ok={}, failed={}, lines={}, parsed={}, inserted={}",
            self.files,
            self.succeeded,
            self.failed,
            self.lines_scanned,
            self.events_matched,
            self.events_inserted
        )
    }
}

/// Everything one invocation did, file by file.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub log_glob: String,
    pub dry_run: bool,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn totals(&self) -> RunTotals {
        let mut totals = RunTotals {
            files: self.files.len(),
            ..RunTotals::default()
        };
        for file in &self.files {
            if file.state.is_success() {
                totals.succeeded += 1;
                totals.lines_scanned += file.stats.lines_scanned;
                totals.events_matched += file.stats.events_matched;
                totals.events_inserted += file.stats.events_inserted;
            } else {
                totals.failed += 1;
            }
        }
        totals
    }

    pub fn has_failures(&self) -> bool {
        self.files.iter().any(|f| f.state == FileState::Failed)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Incremental ingest of DSpace `update_item` events for one parser identity.
///
/// Assumes at most one run per parser identity at a time. Set
/// `IngestConfig::lock_dir` to have the pipeline enforce that itself.
pub struct IngestPipeline {
    db: DashboardDb,
    config: IngestConfig,
    identity: Box<dyn FileIdentityProvider>,
}

impl IngestPipeline {
    pub fn new(db: DashboardDb, config: IngestConfig) -> Self {
        Self {
            db,
            config,
            identity: Box::new(MetadataIdentity),
        }
    }

    /// Replace the default metadata-based file identity.
    pub fn with_identity_provider(mut self, provider: impl FileIdentityProvider + 'static) -> Self {
        self.identity = Box::new(provider);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Process every matching file once.
    ///
    /// Only run-level problems (invalid glob, held run lock) are errors.
    /// Per-file failures are reported in the returned `RunReport`.
    pub async fn run(&self) -> Result<RunReport> {
        let _lock = match &self.config.lock_dir {
            Some(dir) => Some(try_lock_run(dir, &self.config.parser_id)?),
            None => None,
        };

        let files = discover_log_files(&self.config.log_glob)?;
        let mut report = RunReport {
            log_glob: self.config.log_glob.clone(),
            dry_run: self.config.dry_run,
            files: Vec::with_capacity(files.len()),
        };

        if files.is_empty() {
            info!(glob = %self.config.log_glob, "No log files matched");
            return Ok(report);
        }

        info!(
            parser = %self.config.parser_id,
            files = files.len(),
            dry_run = self.config.dry_run,
            "Starting ingest run"
        );

        for path in files {
            let file_report = self.process_file(&path).await;
            report.files.push(file_report);
        }

        let totals = report.totals();
        info!(
            files = totals.files,
            ok = totals.succeeded,
            failed = totals.failed,
            lines = totals.lines_scanned,
            parsed = totals.events_matched,
            inserted = totals.events_inserted,
            "Ingest run finished"
        );
        Ok(report)
    }

    /// Run one file's unit of work and record how it ended.
    pub async fn process_file(&self, path: &Path) -> FileReport {
        let mut state = FileState::NotStarted;
        let result = self.ingest_file(path, &mut state).await;

        match result {
            Ok(stats) => {
                info!(
                    file = %path.display(),
                    lines = stats.lines_scanned,
                    parsed = stats.events_matched,
                    inserted = stats.events_inserted,
                    start_offset = stats.start_offset,
                    end_offset = stats.end_offset,
                    dry_run = self.config.dry_run,
                    "File processed"
                );
                FileReport {
                    path: path.to_path_buf(),
                    state,
                    stats,
                    error: None,
                }
            }
            Err(e) => {
                transition(path, &mut state, FileState::Failed);
                if matches!(&e, IngestError::Storage(db) if db.is_unavailable()) {
                    warn!(file = %path.display(), "Database unreachable, file will be retried next run");
                }
                warn!(file = %path.display(), "File failed, cursor left unchanged: {}", e);
                FileReport {
                    path: path.to_path_buf(),
                    state,
                    stats: FileStats::default(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn ingest_file(&self, path: &Path, state: &mut FileState) -> Result<FileStats> {
        let parser_id = self.config.parser_id.as_str();
        let source_file = path.to_string_lossy();

        let metadata = std::fs::metadata(path)?;
        let prior = cursor_store::load(self.db.pool(), parser_id, &source_file).await?;

        let identity = self.identity.identify(
            path,
            &metadata,
            prior.as_ref().map(|cursor| cursor.file_identity.as_str()),
        );
        if identity.strength == IdentityStrength::Weak {
            debug!(file = %path.display(), identity = %identity.value, "Using weak file identity");
        }

        transition(path, state, FileState::Reading);
        let scan = read_from_cursor(path, &identity.value, metadata.len(), prior.as_ref())?;

        let mut stats = FileStats {
            lines_scanned: scan.lines_scanned,
            events_matched: scan.events.len() as u64,
            events_inserted: 0,
            start_offset: scan.start_offset,
            end_offset: scan.end_offset,
        };

        if self.config.dry_run {
            transition(path, state, FileState::DryRun);
            return Ok(stats);
        }

        let span = debug_span!(
            "ingest.commit",
            file = %path.display(),
            events = scan.events.len(),
            duration_ms = tracing::field::Empty
        );
        let start = Instant::now();

        // Dropping the transaction on any error below rolls back both the
        // inserts and the cursor.
        let mut tx = self.db.begin().await?;
        for event in &scan.events {
            if event_store::insert_if_new(&mut *tx, event).await? {
                stats.events_inserted += 1;
            }
        }
        cursor_store::save(&mut *tx, parser_id, &source_file, &identity.value, scan.end_offset)
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        span.in_scope(|| debug!("Committed"));

        transition(path, state, FileState::Committed);
        Ok(stats)
    }
}

fn transition(path: &Path, state: &mut FileState, next: FileState) {
    debug!(file = %path.display(), from = ?*state, to = ?next, "File state");
    *state = next;
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ITEM: &str = "123e4567-e89b-12d3-a456-426614174000";

    fn edit_line(user: &str) -> String {
        format!(
            "2024-03-01 10:15:00,123 INFO org.dspace.content.ItemServiceImpl @ {}::update_item:item_id={}\n",
            user, ITEM
        )
    }

    fn config_for(dir: &Path) -> IngestConfig {
        IngestConfig {
            log_glob: format!("{}/*.log", dir.display()),
            ..IngestConfig::default()
        }
    }

    #[test]
    fn report_lines_render() {
        let ok = FileReport {
            path: PathBuf::from("/dspace/log/dspace.log"),
            state: FileState::Committed,
            stats: FileStats {
                lines_scanned: 10,
                events_matched: 2,
                events_inserted: 1,
                start_offset: 0,
                end_offset: 900,
            },
            error: None,
        };
        assert_eq!(
            ok.to_string(),
            "/dspace/log/dspace.log: lines=10, parsed=2, inserted=1, offset=0->900"
        );

        let failed = FileReport {
            path: PathBuf::from("/dspace/log/other.log"),
            state: FileState::Failed,
            stats: FileStats::default(),
            error: Some("Storage error: boom".to_string()),
        };
        assert_eq!(
            failed.to_string(),
            "/dspace/log/other.log: FAILED: Storage error: boom"
        );

        let report = RunReport {
            log_glob: "/dspace/log/*.log".to_string(),
            dry_run: false,
            files: vec![ok, failed],
        };
        assert!(report.has_failures());
        assert_eq!(
            report.totals().to_string(),
            "Done: files=2, ok=1, failed=1, lines=10, parsed=2, inserted=1"
        );
    }

    #[tokio::test]
    async fn commits_events_and_cursor() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        fs::write(&path, format!("noise\n{}", edit_line("alice@example.org"))).unwrap();

        let db = DashboardDb::open_memory().await.unwrap();
        let pipeline = IngestPipeline::new(db.clone(), config_for(tmp.path()));

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].state, FileState::Committed);
        assert_eq!(report.files[0].stats.events_inserted, 1);

        let cursor = cursor_store::load(db.pool(), "dspace_item_edits", &path.to_string_lossy())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.byte_offset as u64, fs::metadata(&path).unwrap().len());
    }

    #[tokio::test]
    async fn missing_file_fails_alone() {
        let tmp = TempDir::new().unwrap();
        let db = DashboardDb::open_memory().await.unwrap();
        let pipeline = IngestPipeline::new(db, config_for(tmp.path()));

        let report = pipeline.process_file(&tmp.path().join("gone.log")).await;
        assert_eq!(report.state, FileState::Failed);
        assert!(report.error.unwrap().starts_with("IO error"));
    }

    #[tokio::test]
    async fn held_lock_aborts_run() {
        let tmp = TempDir::new().unwrap();
        let locks = tmp.path().join("locks");
        let _held = try_lock_run(&locks, "dspace_item_edits").unwrap();

        let db = DashboardDb::open_memory().await.unwrap();
        let config = IngestConfig {
            lock_dir: Some(locks),
            ..config_for(tmp.path())
        };
        let err = IngestPipeline::new(db, config).run().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
