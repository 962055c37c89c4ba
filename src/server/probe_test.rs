use super::*;
use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;

fn target(url: Option<String>) -> PeerTarget {
    PeerTarget {
        name: "worker",
        env_var: "WORKER_URL",
        url,
    }
}

/// Address that nothing listens on
async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_probe_skipped_without_url() {
    let probe = PeerProbe::new(Duration::from_secs(1));
    let target = target(None);

    let outcome = probe.probe(&target).await;

    assert_eq!(outcome, ProbeOutcome::Skipped);
    assert_eq!(outcome.status(), "skipped");
    assert_eq!(
        outcome.message(&target),
        "WORKER_URL not set — set it to the worker's internal address to test network isolation"
    );
}

#[tokio::test]
async fn test_probe_reports_isolated_on_connection_refused() {
    let probe = PeerProbe::new(Duration::from_secs(1));
    let url = closed_address().await;
    let target = target(Some(url.clone()));

    let outcome = probe.probe(&target).await;

    assert!(matches!(outcome, ProbeOutcome::Isolated { .. }));
    assert_eq!(outcome.status(), "isolated");
    let message = outcome.message(&target);
    assert!(message.starts_with(&format!("cannot reach worker at {}: ", url)));
    assert!(message.ends_with("network isolation is working"));
    // The root cause is part of the message, not just the URL
    assert!(
        message.to_lowercase().contains("refused"),
        "missing refusal cause: {}",
        message
    );
}

/// Any HTTP answer, even an error status, counts as reachable
#[tokio::test]
async fn test_probe_reports_reachable_with_peer_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/healthz", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let probe = PeerProbe::new(Duration::from_secs(2));
    // Trailing slash must not produce `//healthz`
    let url = format!("http://{}/", addr);
    let target = target(Some(url.clone()));

    let outcome = probe.probe(&target).await;

    assert_eq!(outcome, ProbeOutcome::Reachable { status: 503 });
    assert_eq!(outcome.status(), "NOT_ISOLATED");
    assert_eq!(
        outcome.message(&target),
        format!(
            "reached worker at {} — got HTTP 503 — network isolation is BROKEN",
            url
        )
    );

    server.abort();
}

#[tokio::test]
async fn test_probe_times_out_as_isolated() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route(
        "/healthz",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let probe = PeerProbe::new(Duration::from_millis(200));
    let outcome = probe.probe(&target(Some(format!("http://{}", addr)))).await;

    match outcome {
        ProbeOutcome::Isolated { error } => {
            assert!(error.contains("timed out"), "missing timeout cause: {}", error)
        }
        other => panic!("expected isolated, got {:?}", other),
    }

    server.abort();
}

#[derive(Debug)]
struct Layer(&'static str, Option<Box<Layer>>);

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Layer {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.1
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[test]
fn test_error_chain_joins_causes() {
    let err = Layer(
        "error sending request",
        Some(Box::new(Layer(
            "tcp connect error",
            Some(Box::new(Layer("Connection refused", None))),
        ))),
    );

    assert_eq!(
        error_chain(&err),
        "error sending request: tcp connect error: Connection refused"
    );
}

#[test]
fn test_error_chain_skips_repeated_cause() {
    let err = Layer(
        "connect: Connection refused",
        Some(Box::new(Layer("Connection refused", None))),
    );

    assert_eq!(error_chain(&err), "connect: Connection refused");
}
