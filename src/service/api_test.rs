//! Tests for api-only routes and the in-flight drain

use super::super::tests::{get_json, spawn_service, test_config};
use super::*;
use crate::service::ServiceKind;
use std::time::Duration;

#[tokio::test]
async fn test_root_reports_request_number_and_inflight() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;

    let (status, body) = get_json(&reqwest::Client::new(), &format!("{}/", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["service"], "api");
    assert_eq!(body["status"], "ok");

    // "request #<n> | in-flight: 1" - the request counts itself
    let message = body["message"].as_str().unwrap();
    let rest = message.strip_prefix("request #").unwrap();
    let (number, inflight) = rest.split_once(" | in-flight: ").unwrap();
    assert!(number.parse::<u32>().unwrap() < 10_000);
    assert_eq!(inflight, "1");

    assert_eq!(running.state().inflight.current(), 0);
    running.shutdown("test").await;
}

#[tokio::test]
async fn test_unknown_get_path_answers_like_root() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, &format!("{}/some/other/path", base)).await;
    assert_eq!(status, 200);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("request #"));

    let response = client
        .post(format!("{}/some/other/path", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    // HEAD is served like GET
    let response = client
        .head(format!("{}/some/other/path", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    running.shutdown("test").await;
}

#[tokio::test]
async fn test_slow_request_completes_after_duration() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;

    let started = std::time::Instant::now();
    let (status, body) = get_json(&reqwest::Client::new(), &format!("{}/slow", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["message"], "slow request completed after 300ms");
    assert!(started.elapsed() >= Duration::from_millis(300));

    running.shutdown("test").await;
}

/// Shutdown waits for a slow request, which still gets its answer
#[tokio::test]
async fn test_shutdown_drains_slow_request() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;
    let inflight = running.state().inflight.clone();

    let request = tokio::spawn(async move {
        reqwest::get(format!("{}/slow", base))
            .await
            .map(|r| r.status().as_u16())
    });

    tokio::time::timeout(Duration::from_secs(2), async {
        while inflight.current() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let outcome = running.shutdown("SIGTERM").await;

    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(inflight.current(), 0);
    assert_eq!(request.await.unwrap().unwrap(), 200);
}

#[tokio::test]
async fn test_shutdown_deadline_with_stuck_request() {
    let mut config = test_config(ServiceKind::Api);
    config.timings.slow_request = Duration::from_secs(30);
    config.timings.drain_deadline = Duration::from_millis(100);
    let (running, base) = spawn_service(config).await;
    let inflight = running.state().inflight.clone();

    let request = tokio::spawn(async move { reqwest::get(format!("{}/slow", base)).await });

    tokio::time::timeout(Duration::from_secs(2), async {
        while inflight.current() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let outcome = running.shutdown("SIGTERM").await;

    assert_eq!(outcome, ShutdownOutcome::DeadlineExceeded { inflight: 1 });
    assert_eq!(outcome.exit_code(), 1);
    request.abort();
}

#[tokio::test]
async fn test_protected_without_principal_is_unauthorized() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;

    let (status, body) = get_json(&reqwest::Client::new(), &format!("{}/protected", base)).await;

    assert_eq!(status, 401);
    assert_eq!(body["status"], "unauthorized");
    assert_eq!(
        body["message"],
        "missing X-Unkey-Principal header — sentinel middleware not configured?"
    );

    running.shutdown("test").await;
}

#[tokio::test]
async fn test_protected_echoes_json_principal() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;

    let response = reqwest::Client::new()
        .get(format!("{}/protected", base))
        .header("X-Unkey-Principal", r#"{"keyId":"key_123","meta":{"plan":"pro"}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let text = response.text().await.unwrap();
    // Pretty printed
    assert!(text.contains("\n  \"principal\": {"));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["status"], "authenticated");
    assert_eq!(body["service"], "api");
    assert_eq!(body["port"], running.state().port.to_string());
    assert_eq!(body["principal"]["keyId"], "key_123");
    assert_eq!(body["principal"]["meta"]["plan"], "pro");
    assert!(body.get("timestamp").is_none());

    running.shutdown("test").await;
}

/// The JSON literal `null` is a valid, empty principal
#[tokio::test]
async fn test_protected_accepts_null_principal() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;

    let response = reqwest::Client::new()
        .get(format!("{}/protected", base))
        .header("X-Unkey-Principal", "null")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "authenticated");
    assert!(body["principal"].is_null());
    assert!(body.as_object().unwrap().contains_key("principal"));

    running.shutdown("test").await;
}

#[tokio::test]
async fn test_protected_falls_back_to_raw_principal() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;
    let client = reqwest::Client::new();

    for raw in ["not-json", "[1,2,3]"] {
        let response = client
            .get(format!("{}/protected", base))
            .header("X-Unkey-Principal", raw)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], format!("principal (raw): {}", raw));
    }

    running.shutdown("test").await;
}

#[tokio::test]
async fn test_env_dumps_environment_sorted() {
    let (running, base) = spawn_service(test_config(ServiceKind::Api)).await;

    let response = reqwest::get(format!("{}/env", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();

    let dumped: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
    assert_eq!(dumped, environment_snapshot());

    // Keys appear in sorted order in the body
    let positions: Vec<usize> = dumped
        .keys()
        .map(|k| text.find(&format!("\"{}\":", k)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    running.shutdown("test").await;
}

/// The worker does not expose api routes; unknown GETs hit its root
#[tokio::test]
async fn test_worker_has_no_api_routes() {
    let (running, base) = spawn_service(test_config(ServiceKind::Worker)).await;

    let (status, body) = get_json(&reqwest::Client::new(), &format!("{}/env", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["service"], "worker");
    assert_eq!(body["message"], "background worker running");

    running.shutdown("test").await;
}
