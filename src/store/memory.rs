//! In-memory credential store, used in tests and for running without an
//! external record store.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::models::{Credential, UserId};

use super::CredentialStore;

pub struct MemoryCredentialStore {
    credentials: Mutex<HashMap<UserId, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.credentials.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<Credential>> {
        let credentials = self.credentials.lock().await;
        Ok(credentials.get(user_id).cloned())
    }

    async fn upsert(&self, credential: &Credential) -> Result<()> {
        let mut credentials = self.credentials.lock().await;
        credentials.insert(credential.user_id.clone(), credential.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool> {
        let mut credentials = self.credentials.lock().await;
        Ok(credentials.remove(user_id).is_some())
    }
}
