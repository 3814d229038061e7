//! Integration tests against a live MongoDB server.
//!
//! These tests are skipped unless `SHORTLINK_TEST_MONGODB_URI` points at a
//! reachable server, e.g. `mongodb://localhost:27017`. Each test works in
//! its own database, dropped at the start of the run.

use jiff::{SignedDuration, Timestamp};
use mongodb::bson::doc;
use mongodb::Client;
use shortlink_core::{Code, Repository, Shortlink};
use shortlink_storage::MongoRepository;
use std::sync::Arc;

const MONGODB_URI_ENV: &str = "SHORTLINK_TEST_MONGODB_URI";

struct Fixture {
    database: mongodb::Database,
    repo: MongoRepository,
}

impl Fixture {
    /// Returns `None` (skipping the test) when no server is configured.
    async fn start(name: &str) -> Option<Self> {
        let Ok(uri) = std::env::var(MONGODB_URI_ENV) else {
            eprintln!("skipping: set {MONGODB_URI_ENV} to run MongoDB integration tests");
            return None;
        };

        let client = Client::with_uri_str(&uri).await.expect("connect mongodb");
        let database = client.database(&format!("shortlink_test_{name}"));
        database.drop().await.expect("drop test database");

        let repo = MongoRepository::new(client, database.clone())
            .await
            .expect("create repository");

        Some(Self { database, repo })
    }
}

fn code(s: &str) -> Code {
    Code::new_unchecked(s)
}

fn link(c: &str, url: &str) -> Shortlink {
    Shortlink::new(code(c), url)
}

#[tokio::test]
async fn upsert_then_get() {
    let Some(f) = Fixture::start("upsert_then_get").await else {
        return;
    };

    f.repo
        .upsert(link("abc123", "https://example.com"))
        .await
        .unwrap();

    let found = f.repo.get(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(found.code, code("abc123"));
    assert_eq!(found.url, "https://example.com");
    assert_eq!(found.ttl, None);

    assert!(f.repo.get(&code("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_document_is_not_found_immediately() {
    let Some(f) = Fixture::start("expired_get").await else {
        return;
    };

    f.repo
        .upsert(Shortlink::with_ttl(
            code("abc123"),
            "https://example.com",
            Timestamp::now() - SignedDuration::from_secs(1),
        ))
        .await
        .unwrap();

    // The server reaper runs about once a minute; the read-time check
    // must hide the document long before that.
    assert!(f.repo.get(&code("abc123")).await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_without_ttl_unsets_expiry() {
    let Some(f) = Fixture::start("unset_ttl").await else {
        return;
    };

    f.repo
        .upsert(Shortlink::with_ttl(
            code("abc123"),
            "https://example.com",
            Timestamp::now() - SignedDuration::from_secs(1),
        ))
        .await
        .unwrap();
    f.repo
        .upsert(link("abc123", "https://example.com"))
        .await
        .unwrap();

    let found = f.repo.get(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(found.ttl, None);

    // The field must be gone from the document, not just stale.
    let raw = f
        .database
        .collection::<mongodb::bson::Document>("codes")
        .find_one(doc! { "_id": "abc123" })
        .await
        .unwrap()
        .unwrap();
    assert!(!raw.contains_key("ttl"));
}

#[tokio::test]
async fn ttl_round_trips_at_millisecond_precision() {
    let Some(f) = Fixture::start("ttl_round_trip").await else {
        return;
    };

    let ttl = Timestamp::from_millisecond(
        (Timestamp::now() + SignedDuration::from_hours(1)).as_millisecond(),
    )
    .unwrap();

    f.repo
        .upsert(Shortlink::with_ttl(code("abc123"), "https://example.com", ttl))
        .await
        .unwrap();

    let found = f.repo.get(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(found.ttl, Some(ttl));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let Some(f) = Fixture::start("delete_idempotent").await else {
        return;
    };

    f.repo.delete(&code("missing")).await.unwrap();

    f.repo
        .upsert(link("abc123", "https://example.com"))
        .await
        .unwrap();
    f.repo.delete(&code("abc123")).await.unwrap();
    f.repo.delete(&code("abc123")).await.unwrap();

    assert!(f.repo.get(&code("abc123")).await.unwrap().is_none());
}

#[tokio::test]
async fn list_pages_with_total() {
    let Some(f) = Fixture::start("list_pages").await else {
        return;
    };

    for i in 0..12u64 {
        f.repo
            .upsert(link(
                &format!("code-{i:02}"),
                &format!("https://example.com/{i}"),
            ))
            .await
            .unwrap();
    }

    let (rows, total) = f.repo.list(0, 5).await.unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(total, 12);

    let (rows, total) = f.repo.list(2, 5).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(total, 12);
}

#[tokio::test]
async fn migrate_removes_invalid_ids() {
    let Some(f) = Fixture::start("migrate").await else {
        return;
    };

    f.repo.upsert(link("abc123", "https://x")).await.unwrap();
    // Documents written by the pre-validation schema went in raw.
    f.database
        .collection::<mongodb::bson::Document>("codes")
        .insert_one(doc! { "_id": "bad key!", "url": "https://y" })
        .await
        .unwrap();

    f.repo.migrate().await.unwrap();

    assert!(f.repo.get(&code("abc123")).await.unwrap().is_some());
    let raw = f
        .database
        .collection::<mongodb::bson::Document>("codes")
        .find_one(doc! { "_id": "bad key!" })
        .await
        .unwrap();
    assert!(raw.is_none());

    let (_, total) = f.repo.list(0, 10).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn concurrent_upserts_last_write_wins() {
    let Some(f) = Fixture::start("concurrent_upsert").await else {
        return;
    };
    let repo = Arc::new(f.repo);

    let a = {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move {
            for _ in 0..20 {
                repo.upsert(link("abc123", "https://a.example.com"))
                    .await
                    .unwrap();
            }
        })
    };
    let b = {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move {
            for _ in 0..20 {
                repo.upsert(link("abc123", "https://b.example.com"))
                    .await
                    .unwrap();
            }
        })
    };
    a.await.unwrap();
    b.await.unwrap();

    let found = repo.get(&code("abc123")).await.unwrap().unwrap();
    assert!(
        found.url == "https://a.example.com" || found.url == "https://b.example.com",
        "unexpected url: {}",
        found.url
    );
}
