//! Join record repository tests against a live PostgreSQL.
//!
//! Skipped unless `TEST_DATABASE_URL` is set. Each test uses its own table so
//! runs do not interfere.

use chrono::{Duration, Utc};
use domain::models::{JoinType, NewJoinRecord};
use domain::services::{JoinRecordStore, LedgerError};
use persistence::db::{create_pool, DatabaseConfig};
use persistence::repositories::JoinRecordRepository;
use uuid::Uuid;

async fn repository(suffix: &str) -> Option<JoinRecordRepository> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 2,
        min_connections: 1,
        connect_timeout_secs: 5,
        idle_timeout_secs: 60,
    };
    let pool = create_pool(&config).await.expect("test database reachable");
    let table = format!("test_joins_{}", suffix);
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(&pool)
        .await
        .expect("drop test table");
    let repo = JoinRecordRepository::new(pool, &table).expect("valid table name");
    repo.ensure_schema().await.expect("schema created");
    Some(repo)
}

fn new_record(invitee: &str, code: Option<&str>) -> NewJoinRecord {
    NewJoinRecord {
        guild_id: "81384788765712384".to_string(),
        invitee_id: invitee.to_string(),
        inviter_id: code.map(|_| "80351110224678912".to_string()),
        invite_code: code.map(str::to_string),
        join_type: if code.is_some() {
            JoinType::Normal
        } else {
            JoinType::Unknown
        },
        fake: false,
        joined_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_insert_find_and_close() {
    let Some(repo) = repository("lifecycle").await else {
        return;
    };

    let inserted = repo.insert(new_record("1", Some("abc"))).await.unwrap();
    assert!(inserted.is_open());
    assert_eq!(inserted.join_type, JoinType::Normal);

    let open = repo.find_open("81384788765712384", "1").await.unwrap().unwrap();
    assert_eq!(open.id, inserted.id);

    let left_at = Utc::now();
    let closed = repo.close(inserted.id, left_at).await.unwrap();
    assert!(closed.left_at.is_some());
    assert_eq!(closed.invite_code.as_deref(), Some("abc"));

    assert!(repo.find_open("81384788765712384", "1").await.unwrap().is_none());
    assert!(repo
        .latest_left_at("81384788765712384", "1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_second_open_record_is_rejected() {
    let Some(repo) = repository("single_open").await else {
        return;
    };

    repo.insert(new_record("2", None)).await.unwrap();
    let err = repo.insert(new_record("2", None)).await.unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
}

#[tokio::test]
async fn test_latest_left_at_picks_newest() {
    let Some(repo) = repository("latest_left").await else {
        return;
    };
    let now = Utc::now();

    let first = repo.insert(new_record("3", None)).await.unwrap();
    repo.close(first.id, now - Duration::days(10)).await.unwrap();
    let second = repo.insert(new_record("3", None)).await.unwrap();
    repo.close(second.id, now - Duration::days(1)).await.unwrap();

    let latest = repo
        .latest_left_at("81384788765712384", "3")
        .await
        .unwrap()
        .unwrap();
    assert!(latest > now - Duration::days(2));
}

#[tokio::test]
async fn test_close_unknown_record_is_not_found() {
    let Some(repo) = repository("not_found").await else {
        return;
    };

    let id = Uuid::new_v4();
    let err = repo.close(id, Utc::now()).await.unwrap_err();

    assert!(matches!(err, LedgerError::NotFound(missing) if missing == id));
}
