//! End-to-end tests for the inbound receiver: authentication matrix,
//! payload validation, discovery, and handler failure mapping.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use hookline_api::{create_router, AppState, ReceivedEventHandler, ReceiverConfig};
use hookline_core::{CoreError, EventType};
use hookline_signing::{sign, API_KEY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const API_KEY: &str = "partner-api-key";
const SECRET: &str = "partner-shared-secret";

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(ReceiverConfig {
        api_key: API_KEY.to_string(),
        shared_secret: SECRET.to_string(),
    }))
}

async fn spawn_server(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn valid_body() -> String {
    "{\"event\":\"contact.created\",\"data\":{\"id\":\"42\"}}".to_string()
}

/// POSTs a body with a full, correctly signed header set.
async fn post_signed(base: &str, body: String, secret: &str) -> reqwest::Response {
    let signature = sign(body.as_bytes(), secret);
    reqwest::Client::new()
        .post(format!("{base}/webhooks/receive"))
        .header("content-type", "application/json")
        .header(API_KEY_HEADER, API_KEY)
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, unix_now().to_string())
        .body(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn accepts_fully_authenticated_webhook() {
    let base = spawn_server(test_state()).await;

    let response = post_signed(&base, valid_body(), SECRET).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["received"], true);
    assert_eq!(body["event"], "contact.created");
}

#[tokio::test]
async fn forged_signature_returns_401() {
    let base = spawn_server(test_state()).await;

    // Valid API key, signature computed with the wrong secret.
    let response = post_signed(&base, valid_body(), "attacker-secret").await;
    assert_eq!(response.status(), 401);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid signature");
}

#[tokio::test]
async fn missing_api_key_returns_401() {
    let base = spawn_server(test_state()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/webhooks/receive"))
        .header("content-type", "application/json")
        .body(valid_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing API key");
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let base = spawn_server(test_state()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/webhooks/receive"))
        .header("content-type", "application/json")
        .header(API_KEY_HEADER, "not-the-key")
        .body(valid_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn stale_timestamp_returns_401() {
    let base = spawn_server(test_state()).await;
    let body = valid_body();
    let signature = sign(body.as_bytes(), SECRET);

    let response = reqwest::Client::new()
        .post(format!("{base}/webhooks/receive"))
        .header("content-type", "application/json")
        .header(API_KEY_HEADER, API_KEY)
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, (unix_now() - 301).to_string())
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn api_key_alone_is_sufficient() {
    // Timestamp and signature are enforced only when present, supporting
    // incremental partner rollout.
    let base = spawn_server(test_state()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/webhooks/receive"))
        .header("content-type", "application/json")
        .header(API_KEY_HEADER, API_KEY)
        .body(valid_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn unknown_event_type_returns_400() {
    let base = spawn_server(test_state()).await;

    let body = "{\"event\":\"invoice.paid\",\"data\":{}}".to_string();
    let response = post_signed(&base, body, SECRET).await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn missing_fields_return_400() {
    let base = spawn_server(test_state()).await;

    let response = post_signed(&base, "{}".to_string(), SECRET).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn non_object_data_returns_400() {
    let base = spawn_server(test_state()).await;

    let body = "{\"event\":\"note.created\",\"data\":\"plain string\"}".to_string();
    let response = post_signed(&base, body, SECRET).await;

    assert_eq!(response.status(), 400);
}

#[derive(Debug)]
struct FailingHandler;

#[async_trait::async_trait]
impl ReceivedEventHandler for FailingHandler {
    async fn handle(&self, _event: EventType, _data: serde_json::Value) -> Result<(), CoreError> {
        Err(CoreError::storage("downstream unavailable"))
    }
}

#[tokio::test]
async fn handler_failure_returns_500() {
    let state = Arc::new(AppState::with_handler(
        ReceiverConfig { api_key: API_KEY.to_string(), shared_secret: SECRET.to_string() },
        Arc::new(FailingHandler),
    ));
    let base = spawn_server(state).await;

    let response = post_signed(&base, valid_body(), SECRET).await;
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn discovery_lists_supported_event_types() {
    let base = spawn_server(test_state()).await;

    let response =
        reqwest::Client::new().get(format!("{base}/webhooks/receive")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let events = body["supported_events"].as_array().unwrap();
    assert_eq!(events.len(), 11);
    assert!(events.iter().any(|event| event == "contact.created"));
    assert!(events.iter().any(|event| event == "deal.stage_changed"));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let base = spawn_server(test_state()).await;

    let response = reqwest::Client::new().get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("x-request-id").is_some());
}
