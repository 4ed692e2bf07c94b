//! Advisory run lock: one ingest run per parser identity at a time.
//!
//! Overlapping runs are safe for the data (dedup keys and cursor upserts make
//! them converge), but the lock keeps a slow cron run from being doubled up.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{IngestError, Result};

/// Holds the exclusive lock until dropped.
pub struct RunLockGuard {
    _file: File,
    lock_path: PathBuf,
}

impl RunLockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        // flock is released when the file handle closes
        debug!("Releasing run lock: {}", self.lock_path.display());
    }
}

impl std::fmt::Debug for RunLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLockGuard")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

/// Lock file for a parser identity: `<lock_dir>/<parser_id>.lock`.
///
/// Characters that can't appear safely in a file name become `_`.
pub fn lock_path_for(lock_dir: &Path, parser_id: &str) -> PathBuf {
    let name: String = parser_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    lock_dir.join(format!("{}.lock", name))
}

/// Take the run lock without waiting.
///
/// Returns `IngestError::Locked` if another run of the same parser holds it.
pub fn try_lock_run(lock_dir: &Path, parser_id: &str) -> Result<RunLockGuard> {
    fs::create_dir_all(lock_dir)?;
    let lock_path = lock_path_for(lock_dir, parser_id);

    debug!("Attempting to acquire run lock: {}", lock_path.display());

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    // Fully qualified: std::fs::File grew its own try_lock_exclusive in 1.89
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {}
        Err(e) if is_contended(&e) => {
            return Err(IngestError::Locked {
                parser_id: parser_id.to_string(),
                lock_path,
            });
        }
        Err(e) => return Err(e.into()),
    }

    // Owner pid, for humans inspecting a stuck lock
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()?;

    info!(parser = parser_id, "Acquired run lock: {}", lock_path.display());
    Ok(RunLockGuard {
        _file: file,
        lock_path,
    })
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_path_is_sanitized() {
        let dir = Path::new("/var/lock/dashboard");
        assert_eq!(
            lock_path_for(dir, "dspace_item_edits"),
            dir.join("dspace_item_edits.lock")
        );
        assert_eq!(
            lock_path_for(dir, "../etc/passwd"),
            dir.join(".._etc_passwd.lock")
        );
    }

    #[test]
    fn second_run_is_refused_until_first_finishes() {
        let tmp = TempDir::new().unwrap();

        let first = try_lock_run(tmp.path(), "dspace_item_edits").unwrap();
        let contents = fs::read_to_string(first.lock_path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        let err = try_lock_run(tmp.path(), "dspace_item_edits").unwrap_err();
        assert!(matches!(err, IngestError::Locked { .. }));
        assert!(err.is_fatal());

        drop(first);
        assert!(try_lock_run(tmp.path(), "dspace_item_edits").is_ok());
    }

    #[test]
    fn different_parsers_do_not_contend() {
        let tmp = TempDir::new().unwrap();
        let _a = try_lock_run(tmp.path(), "parser_a").unwrap();
        let _b = try_lock_run(tmp.path(), "parser_b").unwrap();
    }
}
