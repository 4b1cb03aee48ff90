//! End-to-end tests against a canned single-connection HTTP stub.

use fauna_client::{ClientError, Connection, MetricsSink, Timer, REQUEST_TIMER};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Records one completed observation per stopped timer.
#[derive(Clone, Default)]
struct RecordingMetrics {
    completed: Arc<AtomicU64>,
}

impl RecordingMetrics {
    fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl MetricsSink for RecordingMetrics {
    fn start_timer(&self, name: &str) -> Timer {
        assert_eq!(name, REQUEST_TIMER);
        let completed = self.completed.clone();
        Timer::new(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        })
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}

/// Serves exactly one HTTP/1.1 exchange, then hands back the raw request.
async fn spawn_server(response: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut captured = Vec::new();
        let mut buf = [0u8; 4096];

        let body_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break captured.len();
            }
            captured.extend_from_slice(&buf[..n]);
            if let Some(pos) = find_subslice(&captured, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&captured[..pos]).to_string();
                break pos + 4 + content_length(&head);
            }
        };
        while captured.len() < body_end {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            captured.extend_from_slice(&buf[..n]);
        }

        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&captured).to_string());
    });

    (format!("http://{addr}"), rx)
}

const PLAIN_OK: &str =
    "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}";

#[tokio::test]
async fn test_get_sends_contract_headers() {
    let (root, captured) = spawn_server(PLAIN_OK).await;
    let metrics = RecordingMetrics::default();

    let conn = Connection::builder()
        .with_fauna_root(&root)
        .unwrap()
        .with_auth_token("secret")
        .with_metrics(Arc::new(metrics.clone()))
        .build()
        .unwrap();

    let response = conn
        .get("/ping", &Default::default(), None)
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.body(), "{}");

    let request = captured.await.unwrap();
    assert!(request.starts_with("GET /ping HTTP/1.1\r\n"));
    assert!(request.contains("authorization: Bearer secret\r\n"));
    assert!(request.contains("x-faunadb-api-version: 4\r\n"));
    assert!(request.contains("user-agent: Fauna JVM Http Client\r\n"));
    assert!(request.contains("x-fauna-driver: Java\r\n"));
    assert!(request.contains("content-type: application/json; charset=utf-8\r\n"));
    assert!(!request.to_ascii_lowercase().contains("x-query-timeout"));
    assert!(!request.to_ascii_lowercase().contains("x-last-seen-txn"));
    assert_eq!(metrics.completed(), 1);
}

#[tokio::test]
async fn test_response_txn_time_advances_register_and_next_request() {
    let response =
        "HTTP/1.1 200 OK\r\nx-txn-time: 250\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}";
    let (root, _captured) = spawn_server(response).await;

    let conn = Connection::builder()
        .with_fauna_root(&root)
        .unwrap()
        .with_auth_token("secret")
        .with_last_seen_txn(100)
        .build()
        .unwrap();

    conn.post("/", &json!({"ping": true}), None).await.unwrap();
    assert_eq!(conn.last_txn_time(), 250);

    // Absolute paths replace the root, so the same connection can hit a
    // second stub; its request must echo the advanced register.
    let (root2, captured2) = spawn_server(PLAIN_OK).await;
    conn.post(&root2, &json!({}), None).await.unwrap();
    let request = captured2.await.unwrap();
    assert!(request.contains("x-last-seen-txn: 250\r\n"));
}

#[tokio::test]
async fn test_register_keeps_maximum_of_concurrent_txn_times() {
    let r400 =
        "HTTP/1.1 200 OK\r\nx-txn-time: 400\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}";
    let r300 =
        "HTTP/1.1 200 OK\r\nx-txn-time: 300\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}";

    let (root_a, _ca) = spawn_server(r400).await;
    let (root_b, _cb) = spawn_server(r300).await;

    let conn = Connection::builder()
        .with_fauna_root(&root_a)
        .unwrap()
        .with_auth_token("secret")
        .build()
        .unwrap();

    let body = json!({});
    let (a, b) = tokio::join!(
        conn.post("/", &body, None),
        conn.post(&root_b, &body, None),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(conn.last_txn_time(), 400);
}

#[tokio::test]
async fn test_error_statuses_flow_through() {
    let response = "HTTP/1.1 400 Bad Request\r\ncontent-length: 9\r\nconnection: close\r\n\r\nbad query";
    let (root, _captured) = spawn_server(response).await;

    let conn = Connection::builder()
        .with_fauna_root(&root)
        .unwrap()
        .with_auth_token("secret")
        .build()
        .unwrap();

    let response = conn.post("/", &json!({}), None).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.body(), "bad query");
}

#[tokio::test]
async fn test_timer_stops_on_transport_failure() {
    let metrics = RecordingMetrics::default();

    // A listener that is bound and immediately dropped leaves a port nothing
    // accepts on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let root = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let conn = Connection::builder()
        .with_fauna_root(&root)
        .unwrap()
        .with_auth_token("secret")
        .with_metrics(Arc::new(metrics.clone()))
        .build()
        .unwrap();

    let result = conn.get("/ping", &Default::default(), None).await;
    assert!(matches!(result, Err(ClientError::Http(_))));
    assert_eq!(metrics.completed(), 1);
}

#[tokio::test]
async fn test_timer_stops_on_construction_failure() {
    let metrics = RecordingMetrics::default();

    let conn = Connection::builder()
        .with_auth_token("secret")
        .with_metrics(Arc::new(metrics.clone()))
        .build()
        .unwrap();

    // A malformed absolute URL cannot be joined onto the root.
    let result = conn.get("http://[invalid", &Default::default(), None).await;
    assert!(matches!(result, Err(ClientError::Url(_))));
    assert_eq!(metrics.completed(), 1);
}

#[tokio::test]
async fn test_query_timeout_header_on_the_wire() {
    let (root, captured) = spawn_server(PLAIN_OK).await;

    let conn = Connection::builder()
        .with_fauna_root(&root)
        .unwrap()
        .with_auth_token("secret")
        .with_query_timeout(std::time::Duration::from_secs(60))
        .build()
        .unwrap();

    conn.get("/ping", &Default::default(), Some(std::time::Duration::from_secs(5)))
        .await
        .unwrap();

    let request = captured.await.unwrap();
    assert!(request.contains("x-query-timeout: 5000\r\n"));
}
