//! HTTP boundary for the UI collaborator.
//!
//! Client errors (missing input) are 400 with a flat `{error}` body;
//! provider and sync failures are 500 with the provider's machine-readable
//! `error_code`/`error_type` attached so the client can distinguish
//! re-authentication from transient failure.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregate::{self, ExpenseEntry, MonthlyAggregate};
use crate::error::Error;
use crate::link::{AuthorizationResult, ConnectionManager};
use crate::models::{AccessToken, Account, Transaction, UserId};
use crate::provider::ProviderClient;
use crate::sync::SyncEngine;

/// Header carrying the linked account's access token.
pub const ACCESS_TOKEN_HEADER: &str = "plaid-access-token";

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub engine: Arc<SyncEngine>,
    pub client: Arc<ProviderClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/create_link_token", post(create_link_token))
        .route("/api/exchange_public_token", post(exchange_public_token))
        .route("/api/accounts", get(accounts))
        .route("/api/transactions", get(transactions))
        .route("/api/monthly_summary", get(monthly_summary))
        .route("/api/expenses", get(expenses))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
}

impl ErrorBody {
    fn message(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            error_code: None,
            error_type: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            Error::InvalidArgument(message) => {
                (StatusCode::BAD_REQUEST, ErrorBody::message(message))
            }
            Error::LinkAborted => (StatusCode::BAD_REQUEST, ErrorBody::message(&self.0)),
            Error::Provider(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: err.message.clone(),
                    error_code: err.error_code.clone(),
                    error_type: err.error_type.clone(),
                },
            ),
            Error::Sync(err) => {
                let body = match err.provider_error() {
                    Some(inner) => ErrorBody {
                        error: err.to_string(),
                        error_code: inner.error_code.clone(),
                        error_type: inner.error_type.clone(),
                    },
                    None => ErrorBody::message(err),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::message(&self.0)),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        (status, Json(body)).into_response()
    }
}

fn require_access_token(headers: &HeaderMap) -> Result<AccessToken, Error> {
    headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(AccessToken::new)
        .ok_or_else(|| Error::invalid_argument("Missing access_token in request headers"))
}

#[derive(Deserialize)]
struct CreateLinkTokenRequest {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct LinkTokenResponse {
    link_token: String,
}

async fn create_link_token(
    State(state): State<AppState>,
    Json(request): Json<CreateLinkTokenRequest>,
) -> Result<Json<LinkTokenResponse>, ApiError> {
    let user_id = request
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::invalid_argument("Missing userId in request body"))?;
    let user_id = UserId::new(user_id)?;

    let link_token = state.manager.start_link(&user_id).await?;
    Ok(Json(LinkTokenResponse { link_token }))
}

#[derive(Deserialize)]
struct ExchangePublicTokenRequest {
    #[serde(default)]
    public_token: Option<String>,
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct ExchangePublicTokenResponse {
    access_token: String,
    item_id: String,
}

async fn exchange_public_token(
    State(state): State<AppState>,
    Json(request): Json<ExchangePublicTokenRequest>,
) -> Result<Json<ExchangePublicTokenResponse>, ApiError> {
    let public_token = request
        .public_token
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::invalid_argument("Missing public_token in request body"))?;

    // With a userId the credential is persisted server-side; without one the
    // caller keeps custody of the returned token.
    let (access_token, item_id) = match request.user_id.as_deref().map(str::trim) {
        Some(user_id) if !user_id.is_empty() => {
            let user_id = UserId::new(user_id)?;
            let credential = state
                .manager
                .complete_link(
                    &user_id,
                    AuthorizationResult::Authorized {
                        public_token: public_token.to_string(),
                    },
                )
                .await?;
            (
                credential.access_token.expose().to_string(),
                credential.item_id,
            )
        }
        _ => {
            let exchanged = state
                .client
                .exchange_public_token(public_token)
                .await
                .map_err(Error::from)?;
            (
                exchanged.access_token.expose().to_string(),
                exchanged.item_id,
            )
        }
    };

    Ok(Json(ExchangePublicTokenResponse {
        access_token,
        item_id,
    }))
}

#[derive(Serialize)]
struct AccountsResponse {
    accounts: Vec<Account>,
}

async fn accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AccountsResponse>, ApiError> {
    let access_token = require_access_token(&headers)?;
    let accounts = state
        .client
        .get_accounts(&access_token)
        .await
        .map_err(Error::from)?;
    Ok(Json(AccountsResponse { accounts }))
}

#[derive(Serialize)]
struct ItemBody {
    item_id: String,
}

#[derive(Serialize)]
struct TransactionsResponse {
    transactions: Vec<Transaction>,
    accounts: Vec<Account>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<ItemBody>,
    total_transactions: usize,
    request_id: String,
}

async fn transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let access_token = require_access_token(&headers)?;
    let snapshot = state
        .engine
        .sync(&access_token, None)
        .await
        .map_err(Error::from)?;

    Ok(Json(TransactionsResponse {
        item: snapshot.item_id.map(|item_id| ItemBody { item_id }),
        total_transactions: snapshot.total_count,
        transactions: snapshot.transactions,
        accounts: snapshot.accounts,
        request_id: snapshot.request_id,
    }))
}

async fn monthly_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MonthlyAggregate>>, ApiError> {
    let access_token = require_access_token(&headers)?;
    let snapshot = state
        .engine
        .sync(&access_token, None)
        .await
        .map_err(Error::from)?;
    Ok(Json(aggregate::monthly_aggregates(&snapshot)))
}

async fn expenses(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ExpenseEntry>>, ApiError> {
    let access_token = require_access_token(&headers)?;
    let snapshot = state
        .engine
        .sync(&access_token, None)
        .await
        .map_err(Error::from)?;
    Ok(Json(aggregate::expense_entries(&snapshot)))
}
