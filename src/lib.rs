pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod models;
pub mod provider;
pub mod server;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
