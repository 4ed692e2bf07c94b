//! Event store: write-once, deduplicated edit events.

use sqlx::Row;

use crate::error::{DbError, Result};
use crate::pool::{Db, DbRow};
use crate::types::{DedupKey, EditEvent, StoredEditEvent};

/// Store `event` unless its dedup key is already present.
///
/// Returns `true` when a row was written, `false` for a duplicate. There is
/// no update path: a stored event is never modified.
pub async fn insert_if_new<'e, E>(executor: E, event: &EditEvent) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let offset = i64::try_from(event.source_byte_offset).map_err(|_| {
        DbError::invalid_input(format!(
            "offset {} does not fit in BIGINT",
            event.source_byte_offset
        ))
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO dashboard_edit_events (
            event_ts, user_email, item_uuid, action, source_file, source_offset, line_hash
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (line_hash) DO NOTHING
        "#,
    )
    .bind(event.event_timestamp)
    .bind(&event.actor_identity)
    .bind(&event.subject_id)
    .bind(&event.action_kind)
    .bind(&event.source_file)
    .bind(offset)
    .bind(event.dedup_key.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of stored events.
pub async fn count<'e, E>(executor: E) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dashboard_edit_events")
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Events that came from one file, in file order.
pub async fn list_for_file<'e, E>(executor: E, source_file: &str) -> Result<Vec<StoredEditEvent>>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, event_ts, user_email, item_uuid, action, source_file, source_offset, line_hash
        FROM dashboard_edit_events
        WHERE source_file = $1
        ORDER BY source_offset, id
        "#,
    )
    .bind(source_file)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_event).collect()
}

fn row_to_event(row: &DbRow) -> Result<StoredEditEvent> {
    let offset: i64 = row.try_get("source_offset")?;
    Ok(StoredEditEvent {
        id: row.try_get("id")?,
        event: EditEvent {
            event_timestamp: row.try_get("event_ts")?,
            actor_identity: row.try_get("user_email")?,
            subject_id: row.try_get("item_uuid")?,
            action_kind: row.try_get("action")?,
            source_file: row.try_get("source_file")?,
            source_byte_offset: u64::try_from(offset).map_err(|_| {
                DbError::invalid_input(format!("negative source_offset {}", offset))
            })?,
            dedup_key: DedupKey::from_stored(row.try_get("line_hash")?),
        },
    })
}
