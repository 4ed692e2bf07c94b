//! Schema for the two tables the dashboard owns.
//!
//! Everything else in the database belongs to DSpace and is never written.

use crate::error::Result;
use crate::DashboardDb;
use tracing::info;

// The older Python parser created `dashboard_item_edit_events` and
// `dashboard_log_parser_state` with an inode-keyed layout, often in this same
// database. Those tables are left alone.
pub const EDIT_EVENTS_TABLE: &str = "dashboard_edit_events";
pub const PARSER_STATE_TABLE: &str = "dashboard_edit_log_cursors";

#[cfg(feature = "sqlite")]
const ID_COLUMN: &str = "id INTEGER PRIMARY KEY AUTOINCREMENT";

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
const ID_COLUMN: &str = "id BIGSERIAL PRIMARY KEY";

impl DashboardDb {
    /// Ensure all tables and indexes exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_edit_event_tables().await?;
        self.create_parser_state_tables().await?;

        info!("Dashboard schema verified");
        Ok(())
    }

    /// Append-only edit events, unique on the line hash.
    async fn create_edit_event_tables(&self) -> Result<()> {
        let ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                {id},
                event_ts TIMESTAMP NOT NULL,
                user_email TEXT NOT NULL,
                item_uuid TEXT NOT NULL,
                action TEXT NOT NULL DEFAULT 'update_item',
                source_file TEXT NOT NULL,
                source_offset BIGINT NOT NULL,
                line_hash TEXT NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
            table = EDIT_EVENTS_TABLE,
            id = ID_COLUMN,
        );
        sqlx::query(&ddl).execute(&self.pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dashboard_edit_events_ts ON dashboard_edit_events(event_ts)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dashboard_edit_events_user ON dashboard_edit_events(user_email)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// One resumption bookmark per (parser, file path).
    async fn create_parser_state_tables(&self) -> Result<()> {
        let ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                parser_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_identity TEXT NOT NULL,
                file_offset BIGINT NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (parser_name, file_path)
            )"#,
            table = PARSER_STATE_TABLE,
        );
        sqlx::query(&ddl).execute(&self.pool).await?;

        Ok(())
    }
}
