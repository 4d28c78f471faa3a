mod account;
mod credential;
mod snapshot;
mod transaction;

pub use account::{Account, AccountBalances};
pub use credential::{AccessToken, Credential, UserId};
pub use snapshot::TransactionSnapshot;
pub use transaction::{PersonalFinanceCategory, Transaction, UNCATEGORIZED};
