//! Cursor and event writes share one transaction per file.

#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use dashboard_db::{cursor_store, event_store, DashboardDb, DedupKey, EditEvent, ACTION_UPDATE_ITEM};
use tempfile::TempDir;

fn sample_event(offset: u64) -> EditEvent {
    let line = format!("line at {}\n", offset);
    EditEvent {
        event_timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap(),
        actor_identity: "alice@example.org".to_string(),
        subject_id: "123e4567-e89b-12d3-a456-426614174000".to_string(),
        action_kind: ACTION_UPDATE_ITEM.to_string(),
        source_file: "/dspace/log/dspace.log".to_string(),
        source_byte_offset: offset,
        dedup_key: DedupKey::compute("unix:9:9", offset, line.as_bytes()),
    }
}

async fn open_db(tmp: &TempDir) -> DashboardDb {
    DashboardDb::open_sqlite(tmp.path().join("dashboard.db"))
        .await
        .unwrap()
}

#[tokio::test]
async fn committed_transaction_persists_events_and_cursor() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;

    let mut tx = db.begin().await.unwrap();
    assert!(event_store::insert_if_new(&mut *tx, &sample_event(0)).await.unwrap());
    assert!(event_store::insert_if_new(&mut *tx, &sample_event(80)).await.unwrap());
    cursor_store::save(&mut *tx, "edits", "/dspace/log/dspace.log", "unix:9:9", 160)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(event_store::count(db.pool()).await.unwrap(), 2);
    let cursor = cursor_store::load(db.pool(), "edits", "/dspace/log/dspace.log")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cursor.byte_offset, 160);
}

#[tokio::test]
async fn dropped_transaction_leaves_nothing_behind() {
    let tmp = TempDir::new().unwrap();
    let db = open_db(&tmp).await;

    {
        let mut tx = db.begin().await.unwrap();
        event_store::insert_if_new(&mut *tx, &sample_event(0))
            .await
            .unwrap();
        cursor_store::save(&mut *tx, "edits", "/dspace/log/dspace.log", "unix:9:9", 80)
            .await
            .unwrap();
        // no commit
    }

    assert_eq!(event_store::count(db.pool()).await.unwrap(), 0);
    assert!(cursor_store::load(db.pool(), "edits", "/dspace/log/dspace.log")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    {
        let db = open_db(&tmp).await;
        event_store::insert_if_new(db.pool(), &sample_event(0))
            .await
            .unwrap();
        db.close().await;
    }

    let db = open_db(&tmp).await;
    assert!(!event_store::insert_if_new(db.pool(), &sample_event(0))
        .await
        .unwrap());
    assert_eq!(event_store::count(db.pool()).await.unwrap(), 1);
}
