use chrono::{Duration, Utc};
use tempfile::TempDir;

use rescue_radar::{
    database::Database,
    models::{NewReading, UpsertAction},
};

async fn setup_test_db() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("radar.db").display()
    );

    let db = Database::from_url(&url)
        .await
        .expect("Failed to connect to database");
    db.init_schema().await.expect("Failed to create schema");

    (temp_dir, db)
}

fn reading(victim_id: &str, distance_cm: f64) -> NewReading {
    NewReading {
        victim_id: victim_id.to_string(),
        distance_cm,
        temperature_c: Some(31.5),
        humidity_pct: Some(80.0),
        gas_ppm: Some(450.0),
        latitude: Some(60.192059),
        longitude: Some(24.945831),
    }
}

#[tokio::test]
async fn test_insert_then_update_keeps_one_row() {
    let (_dir, db) = setup_test_db().await;
    let now = Utc::now();

    let created = db
        .upsert(&reading("vic-test1", 42.5), now)
        .await
        .expect("Failed to insert reading");
    assert_eq!(created.action, UpsertAction::Created);
    assert_eq!(created.reading.distance_cm, 42.5);

    let mut update = reading("vic-test1", 10.0);
    update.temperature_c = None;
    update.latitude = None;
    let updated = db
        .upsert(&update, now + Duration::seconds(1))
        .await
        .expect("Failed to update reading");

    assert_eq!(updated.action, UpsertAction::Updated);
    assert_eq!(updated.reading.id, created.reading.id);
    assert_eq!(updated.reading.distance_cm, 10.0);
    assert_eq!(updated.reading.temperature_c, None);
    assert_eq!(updated.reading.latitude, None);
    assert!(updated.reading.timestamp > created.reading.timestamp);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM victim_readings WHERE victim_id = $1")
        .bind("vic-test1")
        .fetch_one(db.pool())
        .await
        .expect("Failed to count rows");
    assert_eq!(count, 1);

    let stored = db
        .find_by_victim_id("vic-test1")
        .await
        .expect("Failed to look up reading")
        .expect("Reading missing");
    assert_eq!(stored, updated.reading);
}

#[tokio::test]
async fn test_timestamp_never_moves_backwards() {
    let (_dir, db) = setup_test_db().await;
    let now = Utc::now();

    let first = db.upsert(&reading("vic-skew", 1.0), now).await.unwrap();
    let second = db
        .upsert(&reading("vic-skew", 2.0), now - Duration::minutes(5))
        .await
        .unwrap();

    assert_eq!(second.action, UpsertAction::Updated);
    assert!(second.reading.timestamp > first.reading.timestamp);
}

#[tokio::test]
async fn test_list_recent_newest_first_and_bounded() {
    let (_dir, db) = setup_test_db().await;
    let start = Utc::now();

    for i in 0..5 {
        db.upsert(
            &reading(&format!("vic-{i}"), f64::from(i)),
            start + Duration::seconds(i64::from(i)),
        )
        .await
        .unwrap();
    }
    // Refreshing an old victim moves it to the front
    db.upsert(&reading("vic-0", 99.0), start + Duration::seconds(10))
        .await
        .unwrap();

    let recent = db.list_recent(3).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|r| r.victim_id.as_str()).collect();
    assert_eq!(ids, ["vic-0", "vic-4", "vic-3"]);

    let all = db.list_recent(500).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn test_concurrent_writers_share_one_row() {
    let (_dir, db) = setup_test_db().await;

    let writes = (0..10).map(|i| {
        let db = db.clone();
        tokio::spawn(async move { db.upsert(&reading("vic-race", f64::from(i)), Utc::now()).await })
    });
    let mut created = 0;
    for handle in writes {
        let outcome = handle.await.unwrap().expect("Concurrent upsert failed");
        if outcome.action == UpsertAction::Created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(db.list_recent(500).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_schema_is_a_storage_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("empty.db").display()
    );
    let db = Database::from_url(&url).await.unwrap();

    let result = db.upsert(&reading("vic-none", 1.0), Utc::now()).await;
    assert!(matches!(
        result,
        Err(rescue_radar::errors::RescueRadarError::DatabaseError(_))
    ));
}
