//! Ingest configuration and DSpace `local.cfg` lookup.

use dashboard_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::error::{IngestError, Result};

/// Where DSpace writes its application logs.
pub const DEFAULT_LOG_GLOB: &str = "/dspace/log/*.log";

/// Parser identity cursors are stored under.
pub const DEFAULT_PARSER_ID: &str = "dspace_item_edits";

/// DSpace's local overrides file.
pub const DEFAULT_DSPACE_CONFIG_PATH: &str = "/dspace/config/local.cfg";

const DEFAULT_PG_PORT: u16 = 5432;

/// Settings for one ingest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Glob selecting candidate log files
    pub log_glob: String,
    /// Parser identity; cursors are scoped by it
    pub parser_id: String,
    /// Scan and count but write nothing
    pub dry_run: bool,
    /// Take an exclusive run lock in this directory when set
    pub lock_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            log_glob: DEFAULT_LOG_GLOB.to_string(),
            parser_id: DEFAULT_PARSER_ID.to_string(),
            dry_run: false,
            lock_dir: None,
        }
    }
}

/// Key/value pairs from a Java-style properties file such as `local.cfg`.
#[derive(Debug, Clone, Default)]
pub struct DspaceProperties {
    values: HashMap<String, String>,
}

impl DspaceProperties {
    /// Read a properties file. A missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("DSpace config not found: {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::parse(&decode_properties(&bytes)))
    }

    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let key = key.trim().trim_start_matches('\u{feff}');
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), unquote(value.trim()).to_string());
        }

        Self { values }
    }

    /// Value for `key`; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// UTF-16 only when the file says so with a BOM; anything else is treated as
// UTF-8 with replacement.
fn decode_properties(bytes: &[u8]) -> String {
    let utf16 = |chunks: std::slice::ChunksExact<'_, u8>, le: bool| -> String {
        let units: Vec<u16> = chunks
            .map(|pair| {
                if le {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    };

    match bytes {
        [0xFF, 0xFE, rest @ ..] => utf16(rest.chunks_exact(2), true),
        [0xFE, 0xFF, rest @ ..] => utf16(rest.chunks_exact(2), false),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Build a connection URL from DSpace's `db.url`, `db.username` and
/// `db.password`.
///
/// `db.url` is a JDBC URL (`jdbc:postgresql://host[:port]/dbname`). Returns
/// `None` when it is missing, not PostgreSQL, or names no database.
pub fn database_url_from_properties(props: &DspaceProperties) -> Option<String> {
    let raw = props.get("db.url")?;
    let stripped = raw.strip_prefix("jdbc:").unwrap_or(raw);

    let parsed = Url::parse(stripped).ok()?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        debug!(scheme = parsed.scheme(), "db.url is not a PostgreSQL URL");
        return None;
    }

    let dbname = parsed.path().trim_start_matches('/');
    if dbname.is_empty() {
        return None;
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");
    let port = parsed.port().unwrap_or(DEFAULT_PG_PORT);

    let mut url = Url::parse(&format!("postgres://{}:{}/{}", host, port, dbname)).ok()?;
    if let Some(user) = props.get("db.username") {
        url.set_username(user).ok()?;
    }
    if let Some(password) = props.get("db.password") {
        url.set_password(Some(password)).ok()?;
    }

    Some(url.to_string())
}

/// Decide which database the run writes to.
///
/// An explicit URL wins; otherwise DSpace's own connection settings from
/// `dspace_config` are reused.
pub fn resolve_database_config(explicit_url: Option<&str>, dspace_config: &Path) -> Result<DbConfig> {
    if let Some(url) = explicit_url.map(str::trim).filter(|u| !u.is_empty()) {
        info!("Using database URL from command line/environment");
        return Ok(DbConfig::from_url(url)?);
    }

    let props = DspaceProperties::load(dspace_config)?;
    let url = database_url_from_properties(&props).ok_or_else(|| {
        IngestError::config(format!(
            "no database configured: pass --database-url or set db.url in {}",
            dspace_config.display()
        ))
    })?;

    info!("Using database settings from {}", dspace_config.display());
    Ok(DbConfig::from_url(url)?)
}
