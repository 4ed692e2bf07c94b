//! Candidate log file enumeration.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Rotated archives are never read; only live, plain-text logs are.
pub const COMPRESSED_EXTENSIONS: &[&str] = &["gz", "bz2", "xz", "zst", "zip", "tgz", "lz4"];

/// Regular files matching `pattern`, compressed archives excluded, in
/// lexicographic path order.
///
/// An invalid pattern is an error. Entries the glob walk can't read are
/// logged and skipped.
pub fn discover_log_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in glob::glob(pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping unreadable glob entry: {}", e);
                continue;
            }
        };

        if !path.is_file() {
            debug!("Skipping non-file: {}", path.display());
            continue;
        }
        if is_compressed(&path) {
            debug!("Skipping compressed log: {}", path.display());
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            COMPRESSED_EXTENSIONS
                .iter()
                .any(|c| ext.eq_ignore_ascii_case(c))
        })
        .unwrap_or(false)
}
