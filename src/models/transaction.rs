use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Label applied when the provider returned no category at all.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalFinanceCategory {
    pub primary: String,
    pub detailed: String,
}

/// One provider transaction, immutable once returned within a query.
///
/// Amount sign follows the provider convention: positive is an outflow
/// (spending), negative is an inflow (income).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    pub name: String,
    /// Ordered, most-general first. The provider sends `null` when it has
    /// no categorization.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_finance_category: Option<PersonalFinanceCategory>,
    #[serde(default)]
    pub pending: bool,
}

impl Transaction {
    /// Calendar-month grouping key, `YYYY-MM`.
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }

    /// Merchant name when present, otherwise the raw description.
    pub fn display_name(&self) -> &str {
        self.merchant_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }

    /// First category entry, or the fixed fallback label. Both presentation
    /// views rely on this one rule so they never disagree.
    pub fn primary_category(&self) -> &str {
        self.category
            .first()
            .map(String::as_str)
            .unwrap_or(UNCATEGORIZED)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
