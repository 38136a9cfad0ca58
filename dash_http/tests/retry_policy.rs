use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use dash_http::{HttpError, JsonClient};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize, PartialEq)]
struct Story {
    id: u64,
    title: String,
}

#[derive(Clone, Default)]
struct Hits {
    flaky: Arc<AtomicUsize>,
    broken: Arc<AtomicUsize>,
    missing: Arc<AtomicUsize>,
}

async fn ok() -> impl IntoResponse {
    Json(json!({ "id": 1, "title": "hello" }))
}

async fn flaky(State(hits): State<Hits>) -> impl IntoResponse {
    // fails twice, then recovers
    if hits.flaky.fetch_add(1, Ordering::SeqCst) < 2 {
        return (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response();
    }
    Json(json!({ "id": 2, "title": "eventually" })).into_response()
}

async fn broken(State(hits): State<Hits>) -> impl IntoResponse {
    hits.broken.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "kaboom")
}

async fn missing(State(hits): State<Hits>) -> impl IntoResponse {
    hits.missing.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "no such item")
}

async fn huge() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "x".repeat(256 << 10))
}

async fn garbage() -> impl IntoResponse {
    "this is not json"
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(json!({ "id": 3, "title": "too late" }))
}

async fn start_stub() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/ok", get(ok))
        .route("/flaky", get(flaky))
        .route("/broken", get(broken))
        .route("/missing", get(missing))
        .route("/huge", get(huge))
        .route("/garbage", get(garbage))
        .route("/slow", get(slow))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

fn client() -> JsonClient {
    JsonClient::new("dash-http-test/0.1")
        .unwrap()
        .with_retries(2)
        .with_backoff(Duration::from_millis(5))
}

#[tokio::test]
async fn test_decodes_success() {
    let (base, _) = start_stub().await;

    let story: Story = client()
        .get_json(&format!("{base}/ok"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        story,
        Story {
            id: 1,
            title: "hello".to_string()
        }
    );
}

#[tokio::test]
async fn test_retries_server_errors_until_success() {
    let (base, hits) = start_stub().await;

    let story: Story = client()
        .get_json(&format!("{base}/flaky"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(story.id, 2);
    assert_eq!(hits.flaky.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_retries() {
    let (base, hits) = start_stub().await;

    let err = client()
        .get_json::<Story>(&format!("{base}/broken"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Status { status: 500, .. }));
    assert_eq!(hits.broken.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (base, hits) = start_stub().await;

    let err = client()
        .get_json::<Story>(&format!("{base}/missing"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        HttpError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such item");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(hits.missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_error_body_is_truncated() {
    let (base, _) = start_stub().await;

    let err = client()
        .get_json::<Story>(&format!("{base}/huge"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        HttpError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body.len(), 4096);
            assert!(body.chars().all(|c| c == 'x'));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_decode_failure() {
    let (base, _) = start_stub().await;

    let err = client()
        .get_json::<Story>(&format!("{base}/garbage"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Decode { .. }));
}

#[tokio::test]
async fn test_cancellation_interrupts_request() {
    let (base, _) = start_stub().await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client()
        .get_json::<Story>(&format!("{base}/slow"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}
