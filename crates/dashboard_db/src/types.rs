//! Types for the tables this crate owns.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{DbError, Result};

/// Action recorded for DSpace `update_item` audit lines.
pub const ACTION_UPDATE_ITEM: &str = "update_item";

// ============================================================================
// Edit events
// ============================================================================

/// Deterministic fingerprint of one occurrence of a raw log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Hash (file identity, byte offset, raw line bytes).
    ///
    /// Components are separated with ASCII Unit Separator (0x1f) to avoid ambiguity.
    pub fn compute(file_identity: &str, byte_offset: u64, raw_line: &[u8]) -> Self {
        const SEP: u8 = 0x1f;
        let mut hasher = Sha256::new();
        hasher.update(file_identity.as_bytes());
        hasher.update([SEP]);
        hasher.update(byte_offset.to_string().as_bytes());
        hasher.update([SEP]);
        hasher.update(raw_line);
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap a key read back from the store.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observed "item updated" action, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditEvent {
    /// When the action happened, as written in the log (no timezone)
    pub event_timestamp: NaiveDateTime,
    /// Who did it (free text, not validated)
    pub actor_identity: String,
    /// 36-character item identifier
    pub subject_id: String,
    /// `update_item` for this event family
    pub action_kind: String,
    /// Log file the line came from
    pub source_file: String,
    /// Byte position the line started at
    pub source_byte_offset: u64,
    /// Unique fingerprint guarding at-most-once storage
    pub dedup_key: DedupKey,
}

/// A stored edit event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEditEvent {
    pub id: i64,
    #[serde(flatten)]
    pub event: EditEvent,
}

// ============================================================================
// Parser cursors
// ============================================================================

/// Read progress of one parser over one file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCursor {
    /// Physical file the offset refers to
    pub file_identity: String,
    /// Next unread byte (signed as stored; readers range-check it)
    pub byte_offset: i64,
    /// Last successful advance
    pub updated_at: NaiveDateTime,
}

// ============================================================================
// Reports
// ============================================================================

/// Inclusive time range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReportPeriod {
    /// Calendar month, or the whole year when `month == 0`.
    ///
    /// A whole-year period for the current year ends today at 23:59:59.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        Self::new_relative_to(year, month, Local::now().date_naive())
    }

    /// Same as [`ReportPeriod::new`] with an explicit "today".
    pub fn new_relative_to(year: i32, month: u32, today: NaiveDate) -> Result<Self> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| DbError::invalid_input("invalid end of day"))?;

        if month == 0 {
            let start = first_of_month(year, 1)?;
            let last_day = if year == today.year() {
                today
            } else {
                NaiveDate::from_ymd_opt(year, 12, 31)
                    .ok_or_else(|| DbError::invalid_input(format!("invalid year {}", year)))?
            };
            return Ok(Self {
                start,
                end: last_day.and_time(end_of_day),
            });
        }

        if month > 12 {
            return Err(DbError::invalid_input(format!(
                "month must be 0..=12, got {}",
                month
            )));
        }

        let start = first_of_month(year, month)?;
        let next = if month == 12 {
            first_of_month(year + 1, 1)?
        } else {
            first_of_month(year, month + 1)?
        };
        let last_day = next
            .date()
            .pred_opt()
            .ok_or_else(|| DbError::invalid_input("month underflow"))?;

        Ok(Self {
            start,
            end: last_day.and_time(end_of_day),
        })
    }
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .ok_or_else(|| DbError::invalid_input(format!("invalid date {}-{:02}", year, month)))
}

/// Edit activity of one editor in a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorActivity {
    pub editor: String,
    /// Distinct items edited
    pub items: i64,
    /// Total edit events
    pub edits: i64,
}
