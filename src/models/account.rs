use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub current: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<Decimal>,
}

/// Read-only account snapshot. Fetched fresh on each sync; the provider is
/// the source of truth and nothing here is persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub balances: AccountBalances,
}
