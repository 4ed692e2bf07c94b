//! File identity for rotation detection.
//!
//! An identity must stay the same while a log file is appended to and change
//! when the path is pointed at a different physical file (rotation, copy
//! over, delete + recreate).
//!
//! Without inode semantics the identity is a weak fingerprint: creation time
//! (or the path) plus the file size when that file was first seen. The size
//! part is carried forward from the stored identity for as long as the file
//! has not shrunk below it.

use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrength {
    /// Backed by the filesystem's own file handle (inode, file index)
    Strong,
    /// Best-effort fingerprint; may miss a replacement or report a false one
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub value: String,
    pub strength: IdentityStrength,
}

/// Platform seam for computing file identities.
///
/// `prior` is the identity stored with the file's cursor, if any.
pub trait FileIdentityProvider: Send + Sync {
    fn identify(&self, path: &Path, metadata: &Metadata, prior: Option<&str>) -> FileIdentity;
}

/// Identity from filesystem metadata: `unix:<dev>:<ino>`, otherwise a
/// creation-time fingerprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataIdentity;

impl FileIdentityProvider for MetadataIdentity {
    fn identify(&self, path: &Path, metadata: &Metadata, prior: Option<&str>) -> FileIdentity {
        if let Some(value) = strong_identity_from_metadata(metadata) {
            return FileIdentity {
                value,
                strength: IdentityStrength::Strong,
            };
        }

        weak_identity(path, metadata.created().ok(), metadata.len(), prior)
    }
}

/// `created:<nanos>:<first size>`, or `path:<path>:<first size>` when the
/// platform has no creation time.
///
/// A prior identity with the same prefix is kept while `size` is at least
/// its recorded first size; a smaller file is a new one.
fn weak_identity(
    path: &Path,
    created: Option<SystemTime>,
    size: u64,
    prior: Option<&str>,
) -> FileIdentity {
    let created_nanos = created
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos());

    let prefix = match created_nanos {
        Some(nanos) => format!("created:{}", nanos),
        None => format!("path:{}", normalize_path_for_identity(path)),
    };

    let carried = prior.filter(|prior| {
        prior
            .rsplit_once(':')
            .and_then(|(prior_prefix, first_size)| {
                let first_size = first_size.parse::<u64>().ok()?;
                Some(prior_prefix == prefix && size >= first_size)
            })
            .unwrap_or(false)
    });

    let value = match carried {
        Some(prior) => prior.to_string(),
        None => format!("{}:{}", prefix, size),
    };

    FileIdentity {
        value,
        strength: IdentityStrength::Weak,
    }
}

fn normalize_path_for_identity(path: &Path) -> String {
    let path_str = path.to_string_lossy();
    if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    }
}

#[allow(unused_variables)]
fn strong_identity_from_metadata(metadata: &Metadata) -> Option<String> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        return Some(format!("unix:{}:{}", metadata.dev(), metadata.ino()));
    }

    #[cfg(windows)]
    {
        // volume_serial_number/file_index are still unstable on Windows
        // (windows_by_handle), so fall back to the weak fingerprint there.
        return None;
    }

    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}
