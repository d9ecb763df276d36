//! Watcher integration tests
//!
//! Drives a `Watcher` against a `wiremock` registry with a checkpoint file in
//! a temp directory, covering resume-after-restart and skipped ticks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pkgcaster::registry::HttpRegistry;
use pkgcaster::watcher::{
    CheckpointStore, FileCheckpointStore, TickOutcome, WatchEvent, Watcher, WatcherOptions,
};

const CHANGES_PATH: &str = "/-/all/since/";

fn options(server: &MockServer) -> WatcherOptions {
    WatcherOptions {
        base_url: server.uri(),
        interval: Duration::from_secs(3600),
        ..Default::default()
    }
}

async fn watcher(server: &MockServer, checkpoint_file: &std::path::Path) -> Watcher {
    let registry = Arc::new(HttpRegistry::new(Duration::from_millis(500)).unwrap());
    let checkpoints = Arc::new(FileCheckpointStore::new(checkpoint_file));
    Watcher::new(options(server), registry, checkpoints).await
}

#[tokio::test]
async fn test_restart_resumes_from_checkpoint_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint_file = dir.path().join(".lastnpmsync");
    std::fs::write(&checkpoint_file, "1000").unwrap();

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .and(query_param("startkey", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_updated": 2000,
            "foo": {"dist-tags": {"latest": "1.0.0"}, "homepage": "http://x.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .and(query_param("startkey", "2000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_updated": 3000})))
        .expect(1)
        .mount(&server)
        .await;

    let mut first = watcher(&server, &checkpoint_file).await;
    assert_eq!(first.checkpoint(), 1000);
    let mut events = first.subscribe();
    assert!(first.poll_once().await.is_advanced());
    assert_eq!(std::fs::read_to_string(&checkpoint_file).unwrap(), "2000");

    match events.try_recv().unwrap() {
        WatchEvent::Batch(pkgs) => {
            assert_eq!(pkgs.len(), 1);
            assert_eq!(pkgs[0].name, "foo");
            assert_eq!(pkgs[0].url, "http://x.com");
        }
        other => panic!("expected batch, got {:?}", other),
    }
    drop(first);

    // A fresh process picks up where the last one stopped.
    let mut second = watcher(&server, &checkpoint_file).await;
    assert_eq!(second.checkpoint(), 2000);
    assert!(matches!(
        second.poll_once().await,
        TickOutcome::Advanced {
            from: 2000,
            to: 3000,
            emitted: 0
        }
    ));

    let store = FileCheckpointStore::new(&checkpoint_file);
    assert_eq!(store.read().await.unwrap(), Some(3000));
}

#[tokio::test]
async fn test_failed_ticks_do_not_touch_checkpoint_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint_file = dir.path().join(".lastnpmsync");
    std::fs::write(&checkpoint_file, "1000").unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"_updated": 9000}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut watcher = watcher(&server, &checkpoint_file).await;
    let mut events = watcher.subscribe();

    assert!(!watcher.poll_once().await.is_advanced());
    assert!(!watcher.poll_once().await.is_advanced());

    assert!(events.try_recv().is_err());
    assert_eq!(watcher.checkpoint(), 1000);
    assert_eq!(std::fs::read_to_string(&checkpoint_file).unwrap(), "1000");
}

#[tokio::test]
async fn test_first_run_writes_checkpoint_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint_file = dir.path().join("state").join(".lastnpmsync");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_updated": 4102444800000i64
        })))
        .mount(&server)
        .await;

    let mut watcher = watcher(&server, &checkpoint_file).await;
    assert!(!checkpoint_file.exists());
    assert!(watcher.poll_once().await.is_advanced());
    assert_eq!(
        std::fs::read_to_string(&checkpoint_file).unwrap(),
        "4102444800000"
    );
}

#[tokio::test]
async fn test_spawned_watcher_stops_on_shutdown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint_file = dir.path().join(".lastnpmsync");
    std::fs::write(&checkpoint_file, "1").unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_updated": 10,
            "foo": {"dist-tags": {"latest": "1.0.0"}}
        })))
        .mount(&server)
        .await;

    let mut watcher = watcher(&server, &checkpoint_file).await;
    let mut events = watcher.subscribe();
    let handle = watcher.spawn();

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("immediate first poll");
    assert!(matches!(first, Some(WatchEvent::Batch(_))));

    handle.shutdown().await;

    // Remaining events drain, then the channel closes with the watcher.
    while let Some(event) = events.recv().await {
        assert!(matches!(event, WatchEvent::Item(_)));
    }
    assert_eq!(std::fs::read_to_string(&checkpoint_file).unwrap(), "10");
}
