mod client;

pub use client::{ExchangedToken, ProviderClient, TransactionsPage, TRANSACTIONS_PAGE_SIZE};
