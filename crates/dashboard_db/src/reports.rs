//! Read-only report queries over the edit events table.

use sqlx::Row;

use crate::error::{DbError, Result};
use crate::types::{EditorActivity, ReportPeriod};
use crate::DashboardDb;

impl DashboardDb {
    /// Editors ranked by distinct items edited within `period`.
    pub async fn edits_by_editor(
        &self,
        period: &ReportPeriod,
        limit: u32,
    ) -> Result<Vec<EditorActivity>> {
        if limit == 0 {
            return Err(DbError::invalid_input("limit must be positive"));
        }

        let rows = sqlx::query(
            r#"
            SELECT user_email,
                   COUNT(DISTINCT item_uuid) AS items,
                   COUNT(*) AS edits
            FROM dashboard_edit_events
            WHERE event_ts >= $1 AND event_ts <= $2
            GROUP BY user_email
            ORDER BY items DESC, user_email ASC
            LIMIT $3
            "#,
        )
        .bind(period.start)
        .bind(period.end)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(EditorActivity {
                    editor: row.try_get("user_email")?,
                    items: row.try_get("items")?,
                    edits: row.try_get("edits")?,
                })
            })
            .collect()
    }
}
