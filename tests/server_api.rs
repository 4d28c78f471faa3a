use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use secrecy::SecretString;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgerlink::clock::FixedClock;
use ledgerlink::config::{ProviderConfig, ProviderEnvironment};
use ledgerlink::link::ConnectionManager;
use ledgerlink::provider::ProviderClient;
use ledgerlink::server::{router, AppState, ACCESS_TOKEN_HEADER};
use ledgerlink::store::MemoryCredentialStore;
use ledgerlink::sync::SyncEngine;

fn app(server: &MockServer) -> (Router, Arc<MemoryCredentialStore>) {
    let config = ProviderConfig::new(
        SecretString::from("client-id".to_string()),
        SecretString::from("secret".to_string()),
        ProviderEnvironment::Sandbox,
    );
    let client = Arc::new(ProviderClient::new(config).with_base_url(server.uri()));
    let store = Arc::new(MemoryCredentialStore::new());
    let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));

    let state = AppState {
        manager: Arc::new(ConnectionManager::new(client.clone(), store.clone())),
        engine: Arc::new(SyncEngine::new(client.clone(), clock)),
        client,
    };
    (router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_token(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(ACCESS_TOKEN_HEADER, "access-1")
        .body(Body::empty())
        .unwrap()
}

fn march_transactions_body() -> serde_json::Value {
    serde_json::json!({
        "transactions": [
            {
                "transaction_id": "tx_1",
                "account_id": "acc_1",
                "date": "2024-03-10",
                "amount": 50.0,
                "name": "Grocery Store",
                "category": ["Food and Drink", "Groceries"],
                "pending": false
            },
            {
                "transaction_id": "tx_2",
                "account_id": "acc_1",
                "date": "2024-03-12",
                "amount": -30.0,
                "merchant_name": "Employer Inc",
                "name": "PAYROLL",
                "category": null,
                "pending": false
            }
        ],
        "accounts": [{
            "account_id": "acc_1",
            "name": "Checking",
            "subtype": "checking",
            "balances": { "current": 1000.25 }
        }],
        "item": { "item_id": "item-1" },
        "total_transactions": 2,
        "request_id": "req-1"
    })
}

async fn mount_transactions(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/transactions/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(march_transactions_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn transactions_without_credential_header_is_rejected_before_the_provider() {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);

    let request = Request::builder()
        .method("GET")
        .uri("/api/transactions")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Missing access_token"));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "expected no provider calls");
}

#[tokio::test]
async fn create_link_token_requires_a_user_id() {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);

    let (status, body) = send(
        &app,
        json_post("/api/create_link_token", serde_json::json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("userId"));
}

#[tokio::test]
async fn create_link_token_returns_the_provider_token() -> Result<()> {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);

    Mock::given(method("POST"))
        .and(path("/link/token/create"))
        .and(body_partial_json(serde_json::json!({
            "user": { "client_user_id": "user-1" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "link_token": "link-sandbox-1",
            "request_id": "req-1"
        })))
        .mount(&server)
        .await;

    let (status, body) = send(
        &app,
        json_post(
            "/api/create_link_token",
            serde_json::json!({ "userId": "user-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["link_token"], "link-sandbox-1");

    Ok(())
}

#[tokio::test]
async fn exchange_requires_a_public_token() {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);

    let (status, body) = send(
        &app,
        json_post("/api/exchange_public_token", serde_json::json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("public_token"));
}

#[tokio::test]
async fn exchange_with_user_id_persists_the_credential() -> Result<()> {
    let server = MockServer::start().await;
    let (app, store) = app(&server);

    Mock::given(method("POST"))
        .and(path("/item/public_token/exchange"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-sandbox-1",
            "item_id": "item-1",
            "request_id": "req-1"
        })))
        .mount(&server)
        .await;

    let (status, body) = send(
        &app,
        json_post(
            "/api/exchange_public_token",
            serde_json::json!({ "public_token": "public-1", "userId": "user-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_token"], "access-sandbox-1");
    assert_eq!(body["item_id"], "item-1");
    assert_eq!(store.len().await, 1);

    Ok(())
}

#[tokio::test]
async fn transactions_returns_the_reconciled_snapshot() -> Result<()> {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);
    mount_transactions(&server).await;

    let (status, body) = send(&app, get_with_token("/api/transactions")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_transactions"], 2);
    assert_eq!(body["request_id"], "req-1");
    assert_eq!(body["item"]["item_id"], "item-1");
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["accounts"].as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn provider_failure_maps_to_500_with_codes() {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);

    Mock::given(method("POST"))
        .and(path("/transactions/get"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error_code": "ITEM_LOGIN_REQUIRED",
            "error_type": "ITEM_ERROR",
            "error_message": "the login details of this item have changed",
            "request_id": "req-1"
        })))
        .mount(&server)
        .await;

    let (status, body) = send(&app, get_with_token("/api/transactions")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_code"], "ITEM_LOGIN_REQUIRED");
    assert_eq!(body["error_type"], "ITEM_ERROR");
}

#[tokio::test]
async fn monthly_summary_buckets_income_and_spending() -> Result<()> {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);
    mount_transactions(&server).await;

    let (status, body) = send(&app, get_with_token("/api/monthly_summary")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!([{
            "month": "2024-03",
            "income": 30.0,
            "spending": 50.0,
            "savings": -20.0
        }])
    );

    Ok(())
}

#[tokio::test]
async fn expenses_project_with_merchant_and_category_fallbacks() -> Result<()> {
    let server = MockServer::start().await;
    let (app, _store) = app(&server);
    mount_transactions(&server).await;

    let (status, body) = send(&app, get_with_token("/api/expenses")).await;

    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    // Date ascending; merchant name preferred; null category falls back.
    assert_eq!(entries[0]["name"], "Grocery Store");
    assert_eq!(entries[0]["category"], "Food and Drink");
    assert_eq!(entries[1]["name"], "Employer Inc");
    assert_eq!(entries[1]["category"], "Uncategorized");

    Ok(())
}
