//! Recognizes DSpace `update_item` audit lines.
//!
//! ```text
//! 2024-03-01 10:15:00,123 INFO  ... org.dspace.content.ItemServiceImpl @ alice@example.org::update_item:item_id=123e4567-e89b-12d3-a456-426614174000
//! ```

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Component that writes the audit line.
pub const ITEM_SERVICE_MARKER: &str = "ItemServiceImpl";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Fractional seconds (",123" or ".123") are accepted and dropped. The item id
// must be exactly 36 characters, so it may not be followed by another id char.
static UPDATE_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})(?:[,.]\d+)?\s.*?\bItemServiceImpl\s+@\s+(?P<user>[^:]+)::update_item:item_id=(?P<item>[A-Fa-f0-9-]{36})(?:[^A-Fa-f0-9-]|$)",
    )
    .expect("update_item pattern is valid")
});

/// Fields extracted from one matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub event_timestamp: NaiveDateTime,
    pub actor_identity: String,
    pub subject_id: String,
}

/// Match one line of text. Anything that isn't an `update_item` record
/// (including one with an impossible timestamp) is `None`.
pub fn match_line(line: &str) -> Option<ItemUpdate> {
    // Nearly every line is noise; skip the regex for them.
    if !line.contains(ITEM_SERVICE_MARKER) {
        return None;
    }
    let caps = UPDATE_ITEM_RE.captures(line.trim())?;

    let event_timestamp = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT).ok()?;
    let actor_identity = caps["user"].trim();
    if actor_identity.is_empty() {
        return None;
    }

    Some(ItemUpdate {
        event_timestamp,
        actor_identity: actor_identity.to_string(),
        subject_id: caps["item"].to_string(),
    })
}
