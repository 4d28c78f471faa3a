mod memory;

pub use memory::MemoryCredentialStore;

use anyhow::Result;

use crate::models::{Credential, UserId};

/// Persistence boundary for link credentials.
///
/// At most one credential per user; `upsert` replaces atomically so a user
/// can never end up with two.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<Option<Credential>>;
    async fn upsert(&self, credential: &Credential) -> Result<()>;
    async fn delete(&self, user_id: &UserId) -> Result<bool>;
}
