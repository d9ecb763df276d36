//! Registry HTTP client integration tests
//!
//! Runs `HttpRegistry` against a `wiremock` server standing in for the
//! registry change feed.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pkgcaster::registry::{HttpRegistry, RegistryError, RegistryPort, RegistryQuery};

const CHANGES_PATH: &str = "/-/all/since/";

fn registry() -> HttpRegistry {
    HttpRegistry::new(Duration::from_secs(5)).expect("client builds")
}

#[tokio::test]
async fn test_get_sends_stale_and_startkey() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .and(query_param("stale", "update_after"))
        .and(query_param("startkey", "1400000000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_updated": 1400000005000i64,
            "gulp-foo": {"name": "gulp-foo", "dist-tags": {"latest": "0.1.0"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = RegistryQuery::new(&server.uri(), CHANGES_PATH, 1_400_000_000_000);
    let response = registry().get(&query).await.expect("request succeeds");

    assert_eq!(response.status, 200);
    let body = response.body.expect("body decoded");
    assert_eq!(body["_updated"], json!(1400000005000i64));
    assert_eq!(body["gulp-foo"]["dist-tags"]["latest"], json!("0.1.0"));
}

#[tokio::test]
async fn test_get_preserves_key_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"zeta":{},"_updated":5,"alpha":{},"mid":{}}"#.as_bytes().to_vec(),
            "application/json",
        ))
        .mount(&server)
        .await;

    let query = RegistryQuery::new(&server.uri(), CHANGES_PATH, 1);
    let body = registry().get(&query).await.unwrap().body.unwrap();
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["zeta", "_updated", "alpha", "mid"]);
}

#[tokio::test]
async fn test_get_server_error_has_no_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let query = RegistryQuery::new(&server.uri(), CHANGES_PATH, 1);
    let response = registry().get(&query).await.expect("status is not a transport error");
    assert_eq!(response.status, 500);
    assert!(!response.is_success());
    assert!(response.body.is_none());
}

#[tokio::test]
async fn test_get_invalid_json_has_no_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let query = RegistryQuery::new(&server.uri(), CHANGES_PATH, 1);
    let response = registry().get(&query).await.unwrap();
    assert!(response.is_success());
    assert!(response.body.is_none());
}

#[tokio::test]
async fn test_get_array_body_is_passed_through() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
        .mount(&server)
        .await;

    let query = RegistryQuery::new(&server.uri(), CHANGES_PATH, 1);
    let response = registry().get(&query).await.unwrap();
    assert_eq!(response.body, Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn test_get_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"_updated": 1}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = HttpRegistry::new(Duration::from_millis(200)).unwrap();
    let query = RegistryQuery::new(&server.uri(), CHANGES_PATH, 1);
    let result = client.get(&query).await;
    assert!(matches!(result, Err(RegistryError::Timeout(_))));
}

#[tokio::test]
async fn test_get_connection_refused_is_transport_error() {
    let query = RegistryQuery::new("http://127.0.0.1:9", CHANGES_PATH, 1);
    let result = registry().get(&query).await;
    assert!(result.is_err());
}
