//! Typed wrapper around the bank-data provider's REST API.
//!
//! One request/response round trip per operation; retry and backoff belong
//! to callers. Every request authenticates with the injected client id and
//! secret, so the same client serves any credential passed in.

use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::{AccessToken, Account, Transaction, UserId};

/// Provider-enforced maximum page size for transaction fetches.
pub const TRANSACTIONS_PAGE_SIZE: usize = 100;

pub struct ProviderClient {
    config: ProviderConfig,
    base_url: String,
    http: reqwest::Client,
}

/// Result of exchanging a public token for a durable credential.
#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub access_token: AccessToken,
    pub item_id: String,
}

/// One page of the provider's transaction listing.
#[derive(Debug, Clone)]
pub struct TransactionsPage {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    pub item_id: Option<String>,
    pub total_transactions: usize,
    pub request_id: String,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Self {
        let base_url = config.environment.base_url().to_string();
        Self {
            config,
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Override API base URL (useful for tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| ProviderError::transport(format!("request to {path} failed: {err}")))?;

        let status = response.status();
        let body_text = response.text().await.map_err(|err| {
            ProviderError::transport(format!("failed to read {path} response body: {err}"))
        })?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &body_text));
        }

        serde_json::from_str(&body_text).map_err(|err| {
            ProviderError::transport(format!("failed to parse {path} response: {err}"))
        })
    }

    /// Issue a short-lived, single-use token that starts the interactive
    /// authorization flow for `user_id`.
    pub async fn create_link_token(&self, user_id: &UserId) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        struct User<'a> {
            client_user_id: &'a str,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            client_id: &'a str,
            secret: &'a str,
            user: User<'a>,
            client_name: &'a str,
            products: [&'a str; 2],
            country_codes: [&'a str; 2],
            language: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            link_token: String,
        }

        tracing::info!(user_id = %user_id, "Creating link token");

        let response: Response = self
            .post(
                "/link/token/create",
                &Request {
                    client_id: self.config.client_id.expose_secret(),
                    secret: self.config.secret.expose_secret(),
                    user: User {
                        client_user_id: user_id.as_str(),
                    },
                    client_name: "ledgerlink",
                    products: ["auth", "transactions"],
                    country_codes: ["US", "CA"],
                    language: "en",
                },
            )
            .await?;

        Ok(response.link_token)
    }

    /// Exchange the public token returned by the authorization flow for a
    /// durable access token. The caller must have validated that
    /// `public_token` is non-empty.
    pub async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<ExchangedToken, ProviderError> {
        #[derive(Serialize)]
        struct Request<'a> {
            client_id: &'a str,
            secret: &'a str,
            public_token: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            access_token: String,
            item_id: String,
        }

        tracing::info!("Exchanging public token");

        let response: Response = self
            .post(
                "/item/public_token/exchange",
                &Request {
                    client_id: self.config.client_id.expose_secret(),
                    secret: self.config.secret.expose_secret(),
                    public_token,
                },
            )
            .await?;

        Ok(ExchangedToken {
            access_token: AccessToken::new(response.access_token),
            item_id: response.item_id,
        })
    }

    pub async fn get_accounts(
        &self,
        access_token: &AccessToken,
    ) -> Result<Vec<Account>, ProviderError> {
        #[derive(Serialize)]
        struct Request<'a> {
            client_id: &'a str,
            secret: &'a str,
            access_token: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            accounts: Vec<Account>,
        }

        let response: Response = self
            .post(
                "/accounts/get",
                &Request {
                    client_id: self.config.client_id.expose_secret(),
                    secret: self.config.secret.expose_secret(),
                    access_token: access_token.expose(),
                },
            )
            .await?;

        Ok(response.accounts)
    }

    /// Fetch one page of transactions. The caller supplies the offset; page
    /// size is pinned to the provider maximum.
    pub async fn get_transactions_page(
        &self,
        access_token: &AccessToken,
        start_date: NaiveDate,
        end_date: NaiveDate,
        offset: usize,
    ) -> Result<TransactionsPage, ProviderError> {
        #[derive(Serialize)]
        struct Options {
            count: usize,
            offset: usize,
            include_personal_finance_category: bool,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            client_id: &'a str,
            secret: &'a str,
            access_token: &'a str,
            start_date: String,
            end_date: String,
            options: Options,
        }

        #[derive(Deserialize)]
        struct Item {
            item_id: String,
        }

        #[derive(Deserialize)]
        struct Response {
            transactions: Vec<Transaction>,
            #[serde(default)]
            accounts: Vec<Account>,
            #[serde(default)]
            item: Option<Item>,
            total_transactions: usize,
            request_id: String,
        }

        let response: Response = self
            .post(
                "/transactions/get",
                &Request {
                    client_id: self.config.client_id.expose_secret(),
                    secret: self.config.secret.expose_secret(),
                    access_token: access_token.expose(),
                    start_date: start_date.format("%Y-%m-%d").to_string(),
                    end_date: end_date.format("%Y-%m-%d").to_string(),
                    options: Options {
                        count: TRANSACTIONS_PAGE_SIZE,
                        offset,
                        include_personal_finance_category: true,
                    },
                },
            )
            .await?;

        Ok(TransactionsPage {
            transactions: response.transactions,
            accounts: response.accounts,
            item_id: response.item.map(|item| item.item_id),
            total_transactions: response.total_transactions,
            request_id: response.request_id,
        })
    }
}

fn parse_error_body(status: u16, body: &str) -> ProviderError {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error_code: Option<String>,
        #[serde(default)]
        error_type: Option<String>,
        #[serde(default)]
        error_message: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ProviderError {
            status,
            error_code: parsed.error_code,
            error_type: parsed.error_type,
            message: parsed
                .error_message
                .unwrap_or_else(|| format!("provider returned HTTP {status}")),
        },
        Err(_) => ProviderError {
            status,
            error_code: None,
            error_type: None,
            message: format!("provider returned HTTP {status}: {body}"),
        },
    }
}
