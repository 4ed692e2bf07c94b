//! Incremental reader: resumes a log file at its cursor and collects new
//! `update_item` events up to end-of-file.

use dashboard_db::{DedupKey, EditEvent, FileCursor, ACTION_UPDATE_ITEM};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::matcher::match_line;

/// Result of one pass over one file.
#[derive(Debug, Clone, Default)]
pub struct FileScan {
    /// Candidate events in increasing byte-offset order
    pub events: Vec<EditEvent>,
    /// Lines read, matched or not
    pub lines_scanned: u64,
    /// Where reading started
    pub start_offset: u64,
    /// Position after the last complete line read; the next run starts here
    pub end_offset: u64,
}

/// Where to resume reading.
///
/// The stored offset is only trusted when it belongs to the same physical
/// file and still lies inside it. Anything else (first run, rotation,
/// truncation) rereads from the start.
pub fn resolve_start_offset(prior: Option<&FileCursor>, file_identity: &str, file_size: u64) -> u64 {
    let Some(cursor) = prior else {
        return 0;
    };

    if cursor.file_identity != file_identity {
        debug!(
            stored = %cursor.file_identity,
            current = %file_identity,
            "File identity changed; reading from start"
        );
        return 0;
    }

    match u64::try_from(cursor.byte_offset) {
        Ok(offset) if offset <= file_size => offset,
        _ => {
            debug!(
                stored_offset = cursor.byte_offset,
                file_size, "Stored offset outside file; reading from start"
            );
            0
        }
    }
}

/// Resume `path` from its stored cursor and read to end-of-file.
pub fn read_from_cursor(
    path: &Path,
    file_identity: &str,
    file_size: u64,
    prior: Option<&FileCursor>,
) -> io::Result<FileScan> {
    let start_offset = resolve_start_offset(prior, file_identity, file_size);
    scan_from(path, file_identity, start_offset)
}

/// Read `path` from `start_offset` to end-of-file, one line at a time.
///
/// Invalid UTF-8 is replaced, never fatal. A final line without a trailing
/// newline may still be mid-write: it is neither counted nor matched, and
/// `end_offset` stops in front of it so the next run reads it whole.
pub fn scan_from(path: &Path, file_identity: &str, start_offset: u64) -> io::Result<FileScan> {
    let source_file = path.to_string_lossy().into_owned();

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start_offset))?;
    let mut reader = BufReader::new(file);

    let mut scan = FileScan {
        start_offset,
        end_offset: start_offset,
        ..FileScan::default()
    };
    let mut raw_line = Vec::with_capacity(512);

    loop {
        raw_line.clear();
        let line_start = scan.end_offset;
        let read = reader.read_until(b'\n', &mut raw_line)?;
        if read == 0 {
            break;
        }
        if raw_line.last() != Some(&b'\n') {
            debug!(
                file = %source_file,
                offset = line_start,
                pending_bytes = read,
                "Leaving unterminated last line for the next run"
            );
            break;
        }

        scan.end_offset += read as u64;
        scan.lines_scanned += 1;

        let line = String::from_utf8_lossy(&raw_line);
        let Some(update) = match_line(&line) else {
            continue;
        };

        scan.events.push(EditEvent {
            event_timestamp: update.event_timestamp,
            actor_identity: update.actor_identity,
            subject_id: update.subject_id,
            action_kind: ACTION_UPDATE_ITEM.to_string(),
            source_file: source_file.clone(),
            source_byte_offset: line_start,
            dedup_key: DedupKey::compute(file_identity, line_start, &raw_line),
        });
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    const ITEM: &str = "123e4567-e89b-12d3-a456-426614174000";

    fn edit_line(user: &str) -> String {
        format!(
            "2024-03-01 10:15:00,123 INFO org.dspace.content.ItemServiceImpl @ {}::update_item:item_id={}\n",
            user, ITEM
        )
    }

    fn cursor(identity: &str, offset: i64) -> FileCursor {
        FileCursor {
            file_identity: identity.to_string(),
            byte_offset: offset,
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn start_offset_rules() {
        assert_eq!(resolve_start_offset(None, "id", 100), 0);
        assert_eq!(resolve_start_offset(Some(&cursor("id", 40)), "id", 100), 40);
        assert_eq!(resolve_start_offset(Some(&cursor("id", 100)), "id", 100), 100);
        // rotation
        assert_eq!(resolve_start_offset(Some(&cursor("old", 40)), "id", 100), 0);
        // truncation without identity change
        assert_eq!(resolve_start_offset(Some(&cursor("id", 5000)), "id", 1200), 0);
        // corrupt row
        assert_eq!(resolve_start_offset(Some(&cursor("id", -1)), "id", 100), 0);
    }

    #[test]
    fn scan_records_offsets_and_skips_noise() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        let noise = "2024-03-01 10:14:59,000 INFO something else\n";
        let first = edit_line("alice@example.org");
        let second = edit_line("bob@example.org");
        fs::write(&path, format!("{}{}{}", noise, first, second)).unwrap();

        let scan = scan_from(&path, "unix:1:1", 0).unwrap();

        assert_eq!(scan.lines_scanned, 3);
        assert_eq!(scan.events.len(), 2);
        assert_eq!(scan.events[0].source_byte_offset, noise.len() as u64);
        assert_eq!(
            scan.events[1].source_byte_offset,
            (noise.len() + first.len()) as u64
        );
        assert_eq!(scan.events[0].actor_identity, "alice@example.org");
        assert_eq!(scan.events[0].action_kind, ACTION_UPDATE_ITEM);
        assert_eq!(
            scan.end_offset,
            (noise.len() + first.len() + second.len()) as u64
        );
        assert_eq!(
            scan.events[0].dedup_key,
            DedupKey::compute("unix:1:1", noise.len() as u64, first.as_bytes())
        );
    }

    #[test]
    fn scan_resumes_mid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        let first = edit_line("alice@example.org");
        let second = edit_line("bob@example.org");
        fs::write(&path, format!("{}{}", first, second)).unwrap();

        let scan = scan_from(&path, "id", first.len() as u64).unwrap();
        assert_eq!(scan.lines_scanned, 1);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.events[0].actor_identity, "bob@example.org");
        assert_eq!(scan.start_offset, first.len() as u64);
    }

    #[test]
    fn scan_at_end_of_file_reads_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        let line = edit_line("alice@example.org");
        fs::write(&path, &line).unwrap();

        let scan = scan_from(&path, "id", line.len() as u64).unwrap();
        assert_eq!(scan.lines_scanned, 0);
        assert!(scan.events.is_empty());
        assert_eq!(scan.end_offset, line.len() as u64);
    }

    #[test]
    fn invalid_utf8_does_not_abort_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        let mut bytes = b"garbage \xff\xfe here\n".to_vec();
        bytes.extend_from_slice(edit_line("alice@example.org").as_bytes());
        fs::write(&path, &bytes).unwrap();

        let scan = scan_from(&path, "id", 0).unwrap();
        assert_eq!(scan.lines_scanned, 2);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.end_offset, bytes.len() as u64);
    }

    #[test]
    fn unterminated_last_line_waits_for_its_newline() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        let first = edit_line("alice@example.org");
        let second = edit_line("bob@example.org");
        let (head, tail) = second.split_at(40);
        fs::write(&path, format!("{}{}", first, head)).unwrap();

        let scan = scan_from(&path, "id", 0).unwrap();
        assert_eq!(scan.lines_scanned, 1);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.end_offset, first.len() as u64);

        // The writer finishes the line.
        fs::write(&path, format!("{}{}{}", first, head, tail)).unwrap();

        let resumed = scan_from(&path, "id", scan.end_offset).unwrap();
        assert_eq!(resumed.lines_scanned, 1);
        assert_eq!(resumed.events.len(), 1);
        assert_eq!(resumed.events[0].actor_identity, "bob@example.org");
        assert_eq!(resumed.events[0].source_byte_offset, first.len() as u64);
        assert_eq!(resumed.end_offset, (first.len() + second.len()) as u64);
    }

    #[test]
    fn truncated_file_is_reread_from_start() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dspace.log");
        let line = edit_line("alice@example.org");
        fs::write(&path, &line).unwrap();
        let size = fs::metadata(&path).unwrap().len();

        let scan = read_from_cursor(&path, "id", size, Some(&cursor("id", 5000))).unwrap();
        assert_eq!(scan.start_offset, 0);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.end_offset, size);
    }
}
