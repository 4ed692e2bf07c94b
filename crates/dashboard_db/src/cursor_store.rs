//! File cursor store: where each parser stopped reading each file.
//!
//! Both operations take any executor, so callers can run them on the pool
//! or inside the per-file transaction together with event inserts.

use chrono::{NaiveDateTime, Utc};
use sqlx::Row;
use tracing::debug;

use crate::error::{DbError, Result};
use crate::pool::{Db, DbRow};
use crate::types::FileCursor;

/// Last known (file identity, offset) for a parser and path, if any.
pub async fn load<'e, E>(executor: E, parser_id: &str, file_path: &str) -> Result<Option<FileCursor>>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let row = sqlx::query(
        r#"
        SELECT file_identity, file_offset, updated_at
        FROM dashboard_edit_log_cursors
        WHERE parser_name = $1 AND file_path = $2
        "#,
    )
    .bind(parser_id)
    .bind(file_path)
    .fetch_optional(executor)
    .await?;

    row.map(|row| row_to_cursor(&row)).transpose()
}

/// Insert or overwrite the cursor for (parser, path).
///
/// A single upsert statement, so concurrent writers on the same key resolve
/// to last-writer-wins inside their transactions.
pub async fn save<'e, E>(
    executor: E,
    parser_id: &str,
    file_path: &str,
    file_identity: &str,
    byte_offset: u64,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let offset = i64::try_from(byte_offset).map_err(|_| {
        DbError::invalid_input(format!("offset {} does not fit in BIGINT", byte_offset))
    })?;
    let now: NaiveDateTime = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO dashboard_edit_log_cursors (parser_name, file_path, file_identity, file_offset, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (parser_name, file_path) DO UPDATE SET
            file_identity = excluded.file_identity,
            file_offset = excluded.file_offset,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(parser_id)
    .bind(file_path)
    .bind(file_identity)
    .bind(offset)
    .bind(now)
    .execute(executor)
    .await?;

    debug!(parser_id, file_path, file_identity, offset, "Cursor saved");
    Ok(())
}

fn row_to_cursor(row: &DbRow) -> Result<FileCursor> {
    Ok(FileCursor {
        file_identity: row.try_get("file_identity")?,
        byte_offset: row.try_get("file_offset")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::DashboardDb;

    #[tokio::test]
    async fn load_missing_cursor_is_none() {
        let db = DashboardDb::open_memory().await.unwrap();
        let cursor = load(db.pool(), "p", "/var/log/a.log").await.unwrap();
        assert!(cursor.is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let db = DashboardDb::open_memory().await.unwrap();
        save(db.pool(), "p", "/var/log/a.log", "unix:1:7", 1234)
            .await
            .unwrap();

        let cursor = load(db.pool(), "p", "/var/log/a.log")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.file_identity, "unix:1:7");
        assert_eq!(cursor.byte_offset, 1234);
    }

    #[tokio::test]
    async fn save_overwrites_existing_row() {
        let db = DashboardDb::open_memory().await.unwrap();
        save(db.pool(), "p", "/a.log", "unix:1:7", 10).await.unwrap();
        save(db.pool(), "p", "/a.log", "unix:1:8", 3).await.unwrap();

        let cursor = load(db.pool(), "p", "/a.log").await.unwrap().unwrap();
        assert_eq!(cursor.file_identity, "unix:1:8");
        assert_eq!(cursor.byte_offset, 3);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dashboard_edit_log_cursors")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn cursors_are_scoped_by_parser() {
        let db = DashboardDb::open_memory().await.unwrap();
        save(db.pool(), "edits", "/a.log", "unix:1:7", 10)
            .await
            .unwrap();
        save(db.pool(), "other", "/a.log", "unix:1:7", 99)
            .await
            .unwrap();

        let edits = load(db.pool(), "edits", "/a.log").await.unwrap().unwrap();
        let other = load(db.pool(), "other", "/a.log").await.unwrap().unwrap();
        assert_eq!(edits.byte_offset, 10);
        assert_eq!(other.byte_offset, 99);
    }
}
