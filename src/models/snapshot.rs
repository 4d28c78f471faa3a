use serde::Serialize;

use super::{Account, Transaction};

/// The complete, reconciled result of one sync call.
///
/// Invariant: `transactions.len() == total_count`. The sync engine
/// establishes this before handing the snapshot to aggregation; a snapshot
/// is never returned partially filled.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionSnapshot {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub total_count: usize,
    pub request_id: String,
}

impl TransactionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
