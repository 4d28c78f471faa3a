//! Transaction sync engine.
//!
//! Fetches the complete transaction set for a date window through offset
//! pagination, reconciling against the provider's reported total before the
//! snapshot is handed to aggregation. All-or-nothing: a failed page fetch
//! surfaces a [`SyncError`] and no partial snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::SyncError;
use crate::models::{AccessToken, Transaction, TransactionSnapshot};
use crate::provider::{ProviderClient, TransactionsPage};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

// Runaway guard: a window capped at 200 pages of 100 covers 20k transactions.
const MAX_PAGES: usize = 200;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Inclusive calendar-date window, day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `[today - days, today]`.
    pub fn trailing(clock: &dyn Clock, days: i64) -> Self {
        let end = clock.today();
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }
}

pub struct SyncEngine {
    client: Arc<ProviderClient>,
    clock: Arc<dyn Clock>,
    // One guard per credential so concurrent syncs for the same user are
    // serialized while different users run in parallel.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(client: Arc<ProviderClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a consistent snapshot of transactions and accounts.
    ///
    /// `window` defaults to the trailing 30 days. Postcondition:
    /// `snapshot.transactions.len() == snapshot.total_count`.
    pub async fn sync(
        &self,
        access_token: &AccessToken,
        window: Option<SyncWindow>,
    ) -> Result<TransactionSnapshot, SyncError> {
        let window = window
            .unwrap_or_else(|| SyncWindow::trailing(self.clock.as_ref(), DEFAULT_WINDOW_DAYS));

        let guard = self.credential_guard(access_token).await;
        let result = {
            let _in_flight = guard.lock().await;
            self.sync_window(access_token, window).await
        };
        self.release_guard(access_token, guard).await;
        result
    }

    async fn sync_window(
        &self,
        access_token: &AccessToken,
        window: SyncWindow,
    ) -> Result<TransactionSnapshot, SyncError> {
        tracing::info!(start = %window.start, end = %window.end, "Syncing transactions");

        // Accounts, item and request id are retained from the first page.
        let first = self.fetch_page(access_token, &window, 0, 0).await?;
        let accounts = first.accounts;
        let item_id = first.item_id;
        let request_id = first.request_id;
        let mut total = first.total_transactions;
        let mut transactions = first.transactions;
        let mut pages = 1;

        while transactions.len() < total {
            if pages >= MAX_PAGES {
                return Err(SyncError::PageLimit {
                    fetched: transactions.len(),
                    max_pages: MAX_PAGES,
                });
            }

            let offset = transactions.len();
            let page = self.fetch_page(access_token, &window, offset, offset).await?;
            pages += 1;

            // The provider total can shrink mid-sync (a transaction deleted
            // between pages). Trust the latest figure each round so the loop
            // neither spins on a stale count nor truncates.
            total = page.total_transactions;

            if page.transactions.is_empty() {
                tracing::warn!(
                    fetched = transactions.len(),
                    reported_total = total,
                    "Provider returned an empty page before the reported total was reached"
                );
                break;
            }
            transactions.extend(page.transactions);
        }

        let transactions = dedup_by_transaction_id(transactions);
        if transactions.len() != total {
            tracing::warn!(
                fetched = transactions.len(),
                reported_total = total,
                "Snapshot size differs from the provider's reported total after reconciliation"
            );
        }
        let total_count = transactions.len();

        tracing::info!(count = total_count, pages, "Transaction sync complete");

        Ok(TransactionSnapshot {
            transactions,
            accounts,
            item_id,
            total_count,
            request_id,
        })
    }

    async fn fetch_page(
        &self,
        access_token: &AccessToken,
        window: &SyncWindow,
        offset: usize,
        fetched_so_far: usize,
    ) -> Result<TransactionsPage, SyncError> {
        let mut attempt = 0;
        loop {
            match self
                .client
                .get_transactions_page(access_token, window.start, window.end, offset)
                .await
            {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt + 1 < RETRY_ATTEMPTS => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << attempt);
                    tracing::warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider error; retrying page fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(SyncError::Provider {
                        fetched: fetched_so_far,
                        source: err,
                    })
                }
            }
        }
    }

    async fn credential_guard(&self, access_token: &AccessToken) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        in_flight
            .entry(access_token.expose().to_string())
            .or_default()
            .clone()
    }

    // Drop the map entry once no other task holds or awaits this guard.
    // Holding the map lock across the count check means no new clone can be
    // handed out in between, so a count of two (the map's and ours) is
    // conclusive.
    async fn release_guard(&self, access_token: &AccessToken, guard: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        if Arc::strong_count(&guard) == 2 {
            in_flight.remove(access_token.expose());
        }
    }

    #[cfg(test)]
    async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

fn dedup_by_transaction_id(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::with_capacity(transactions.len());
    transactions
        .into_iter()
        .filter(|tx| seen.insert(tx.transaction_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::{ProviderConfig, ProviderEnvironment};
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transaction(id: &str) -> Transaction {
        serde_json::from_value(serde_json::json!({
            "transaction_id": id,
            "account_id": "acc_1",
            "date": "2024-03-05",
            "amount": 1.0,
            "name": "Test",
        }))
        .unwrap()
    }

    #[test]
    fn trailing_window_is_inclusive_of_today() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        let window = SyncWindow::trailing(&clock, DEFAULT_WINDOW_DAYS);

        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let deduped = dedup_by_transaction_id(vec![
            transaction("tx_1"),
            transaction("tx_2"),
            transaction("tx_1"),
        ]);
        let ids: Vec<_> = deduped.iter().map(|tx| tx.transaction_id.as_str()).collect();
        assert_eq!(ids, ["tx_1", "tx_2"]);
    }

    fn engine_for(server: &MockServer) -> SyncEngine {
        let config = ProviderConfig::new(
            SecretString::from("client-id".to_string()),
            SecretString::from("secret".to_string()),
            ProviderEnvironment::Sandbox,
        );
        let client = Arc::new(ProviderClient::new(config).with_base_url(server.uri()));
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        SyncEngine::new(client, clock)
    }

    #[tokio::test]
    async fn completed_syncs_release_their_credential_guards() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transactions": [],
                "accounts": [],
                "total_transactions": 0,
                "request_id": "req_1"
            })))
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        engine.sync(&AccessToken::new("access-1"), None).await?;
        engine.sync(&AccessToken::new("access-2"), None).await?;

        // Re-linking mints fresh tokens, so idle guards must not pile up.
        assert_eq!(engine.in_flight_len().await, 0);
        Ok(())
    }
}
