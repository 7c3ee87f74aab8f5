//! End-to-end cycle against a mock feed host and book downloader over HTTP,
//! with the SQLite dedup store on disk.

use serde_json::json;
use shelf_watcher::testing::{LogLevel, RecordingLogger};
use shelf_watcher::{
    BaseDedupStore, Config, CwaAcquisition, CycleStatus, HttpFeedSource, SqliteDedupStore,
    Timeouts, Watcher,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>Reader's bookshelf: to-read</title>
  <item>
    <guid><![CDATA[https://www.goodreads.com/review/show/1001]]></guid>
    <title><![CDATA[Dune]]></title>
  </item>
  <item>
    <guid><![CDATA[https://www.goodreads.com/review/show/1002]]></guid>
    <title><![CDATA[Unfindable Pamphlet]]></title>
  </item>
</channel>
</rss>"#;

#[tokio::test]
async fn test_full_cycle_over_http_and_sqlite() {
    let feed_host = MockServer::start().await;
    let cwa = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/review/list_rss/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&feed_host)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "reader", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&cwa)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("query", "Dune"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "dune-epub", "title": "Dune", "format": "epub"},
            {"id": "dune-pdf", "title": "Dune", "format": "pdf"}
        ])))
        .mount(&cwa)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("query", "Unfindable Pamphlet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "No books found"})))
        .mount(&cwa)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/download"))
        .and(query_param("id", "dune-epub"))
        .and(query_param("priority", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .expect(1)
        .mount(&cwa)
        .await;

    let feed_url = format!("{}/review/list_rss/42", feed_host.uri());
    let cwa_url = cwa.uri();
    let db_path = dir.path().join("watchers.db");
    let db_path_str = db_path.to_string_lossy().to_string();

    let config = Config::from_lookup(|key| match key {
        "GOODREADS_RSS_URL" => Some(feed_url.clone()),
        "CWA_URL" => Some(cwa_url.clone()),
        "CWA_USER" => Some("reader".to_string()),
        "CWA_PASS" => Some("secret".to_string()),
        "WATCHER_DB_PATH" => Some(db_path_str.clone()),
        _ => None,
    })
    .unwrap();

    let store = SqliteDedupStore::open(&config.db_path).await.unwrap();
    store.initialize().await.unwrap();
    let feed = HttpFeedSource::new(config.feed_url.clone().unwrap()).unwrap();
    let acquisition = CwaAcquisition::new(config.cwa_url.clone(), config.credentials.clone());
    let log = RecordingLogger::new();

    let watcher = Watcher::new(config, Some(feed), store, acquisition, Arc::new(log.clone()));

    let first = watcher.run_cycle().await;
    assert_eq!(first.status, CycleStatus::Completed);
    assert_eq!(first.fetched, 2);
    assert_eq!(first.queued, 1);
    assert_eq!(first.unmatched, 1);

    let second = watcher.run_cycle().await;
    assert_eq!(second.skipped, 1);
    assert_eq!(second.unmatched, 1);
    assert_eq!(second.queued, 0);

    let store = watcher.store();
    assert!(store
        .is_processed("https://www.goodreads.com/review/show/1001")
        .await
        .unwrap());
    assert!(!store
        .is_processed("https://www.goodreads.com/review/show/1002")
        .await
        .unwrap());
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(log.contains(LogLevel::Info, "Successfully queued: Dune"));
}

const SLOW_FEED: &str = r#"<rss><channel>
  <item><guid>g-1</guid><title>Dune</title></item>
  <item><guid>g-2</guid><title>Slow Book</title></item>
  <item><guid>g-3</guid><title>Emma</title></item>
</channel></rss>"#;

#[tokio::test]
async fn test_hung_search_fails_only_that_item() {
    let feed_host = MockServer::start().await;
    let cwa = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/shelf.rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SLOW_FEED))
        .mount(&feed_host)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("query", "Slow Book"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": "slow-epub"}]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&cwa)
        .await;

    for (title, id) in [("Dune", "dune-epub"), ("Emma", "emma-epub")] {
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("query", title))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": id}])))
            .mount(&cwa)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .expect(2)
        .mount(&cwa)
        .await;

    let store = SqliteDedupStore::open(dir.path().join("watchers.db"))
        .await
        .unwrap();
    store.initialize().await.unwrap();

    let feed_url = format!("{}/shelf.rss", feed_host.uri());
    let config = Config::from_lookup(|key| match key {
        "GOODREADS_RSS_URL" => Some(feed_url.clone()),
        _ => None,
    })
    .unwrap();
    let feed = HttpFeedSource::new(feed_url.clone()).unwrap();
    let acquisition = CwaAcquisition::new(cwa.uri(), None).with_timeouts(Timeouts {
        search: Duration::from_millis(100),
        ..Timeouts::default()
    });
    let log = RecordingLogger::new();

    let watcher = Watcher::new(config, Some(feed), store, acquisition, Arc::new(log.clone()));
    let report = watcher.run_cycle().await;

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.queued, 2);
    assert_eq!(report.failed, 1);
    assert!(log.contains(LogLevel::Error, "Error interacting with CWA for 'Slow Book'"));

    let store = watcher.store();
    assert!(store.is_processed("g-1").await.unwrap());
    assert!(!store.is_processed("g-2").await.unwrap());
    assert!(store.is_processed("g-3").await.unwrap());
}
