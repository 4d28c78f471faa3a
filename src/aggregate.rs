//! Pure reductions of a transaction snapshot into presentation series.
//!
//! Decimal arithmetic throughout: summing hundreds of floating-point
//! amounts drifts, decimals do not.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::TransactionSnapshot;

/// Per-month income/spending/savings bucket, ready for charting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyAggregate {
    /// Calendar month, `YYYY-MM`.
    pub month: String,
    pub income: Decimal,
    pub spending: Decimal,
    pub savings: Decimal,
}

/// Chronological projection of one transaction for the expense-detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseEntry {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub name: String,
    pub category: String,
}

/// Reduce a snapshot into one aggregate per distinct month, ascending.
///
/// Sign convention: amount > 0 is spending, amount < 0 contributes its
/// absolute value to income, zero contributes to neither. Savings is
/// computed once per month after both buckets accumulate, so summation
/// order cannot change the result.
pub fn monthly_aggregates(snapshot: &TransactionSnapshot) -> Vec<MonthlyAggregate> {
    #[derive(Default)]
    struct Bucket {
        income: Decimal,
        spending: Decimal,
    }

    let mut months: BTreeMap<String, Bucket> = BTreeMap::new();

    for tx in &snapshot.transactions {
        let bucket = months.entry(tx.month_key()).or_default();
        if tx.amount > Decimal::ZERO {
            bucket.spending += tx.amount;
        } else if tx.amount < Decimal::ZERO {
            bucket.income += tx.amount.abs();
        }
    }

    // BTreeMap iteration is ascending; the zero-padded key makes
    // lexicographic order chronological.
    months
        .into_iter()
        .map(|(month, bucket)| MonthlyAggregate {
            month,
            income: bucket.income,
            spending: bucket.spending,
            savings: bucket.income - bucket.spending,
        })
        .collect()
}

/// Project the same snapshot into date-ascending expense rows.
pub fn expense_entries(snapshot: &TransactionSnapshot) -> Vec<ExpenseEntry> {
    let mut entries: Vec<ExpenseEntry> = snapshot
        .transactions
        .iter()
        .map(|tx| ExpenseEntry {
            date: tx.date,
            amount: tx.amount,
            name: tx.display_name().to_string(),
            category: tx.primary_category().to_string(),
        })
        .collect();

    entries.sort_by(|a, b| a.date.cmp(&b.date));
    entries
}
