//! Connection manager: drives the one-time link handshake.
//!
//! Per user the flow is `Unlinked -> LinkTokenIssued -> Authorized ->
//! Connected`. The interactive authorization collaborator is external; it
//! reports its outcome back as an [`AuthorizationResult`]. Only a successful
//! token exchange persists a credential, so every failure leaves the user in
//! `Unlinked` with no partial state.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ProviderError, Result};
use crate::models::{Credential, UserId};
use crate::provider::ProviderClient;
use crate::store::CredentialStore;

/// Where a user currently stands in the link flow. The two intermediate
/// stages are transient; only `Connected` is backed by stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStage {
    Unlinked,
    LinkTokenIssued,
    Authorized,
    Connected,
}

impl fmt::Display for LinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkStage::Unlinked => "unlinked",
            LinkStage::LinkTokenIssued => "link_token_issued",
            LinkStage::Authorized => "authorized",
            LinkStage::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Outcome reported by the interactive authorization flow.
#[derive(Debug, Clone)]
pub enum AuthorizationResult {
    Authorized { public_token: String },
    Aborted,
    Failed(ProviderError),
}

pub struct ConnectionManager {
    client: Arc<ProviderClient>,
    store: Arc<dyn CredentialStore>,
}

impl ConnectionManager {
    pub fn new(client: Arc<ProviderClient>, store: Arc<dyn CredentialStore>) -> Self {
        Self { client, store }
    }

    /// `Unlinked -> LinkTokenIssued`. The returned token is single-use and
    /// time-limited; expiry is provider-enforced and treated as opaque here.
    pub async fn start_link(&self, user_id: &UserId) -> Result<String> {
        let link_token = self.client.create_link_token(user_id).await?;
        tracing::info!(user_id = %user_id, stage = %LinkStage::LinkTokenIssued, "Link token issued");
        Ok(link_token)
    }

    /// `Authorized -> Connected` on success; terminal failure otherwise.
    ///
    /// A successful exchange upserts the credential, replacing any prior one
    /// for this user. Re-linking replaces, never appends.
    pub async fn complete_link(
        &self,
        user_id: &UserId,
        outcome: AuthorizationResult,
    ) -> Result<Credential> {
        match outcome {
            AuthorizationResult::Authorized { public_token } => {
                if public_token.trim().is_empty() {
                    return Err(Error::invalid_argument("public_token must be non-empty"));
                }

                let exchanged = self.client.exchange_public_token(&public_token).await?;
                let credential = Credential {
                    user_id: user_id.clone(),
                    access_token: exchanged.access_token,
                    item_id: exchanged.item_id,
                };

                self.store
                    .upsert(&credential)
                    .await
                    .map_err(Error::Storage)?;

                tracing::info!(
                    user_id = %user_id,
                    item_id = %credential.item_id,
                    stage = %LinkStage::Connected,
                    "Bank connection established"
                );
                Ok(credential)
            }
            AuthorizationResult::Aborted => {
                tracing::info!(user_id = %user_id, "Link flow aborted by user");
                Err(Error::LinkAborted)
            }
            AuthorizationResult::Failed(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "Link flow failed at provider");
                Err(Error::Provider(err))
            }
        }
    }

    pub async fn credential(&self, user_id: &UserId) -> Result<Option<Credential>> {
        self.store.get(user_id).await.map_err(Error::Storage)
    }

    /// Explicit user disconnect. Returns whether a credential existed.
    pub async fn disconnect(&self, user_id: &UserId) -> Result<bool> {
        let removed = self.store.delete(user_id).await.map_err(Error::Storage)?;
        if removed {
            tracing::info!(user_id = %user_id, stage = %LinkStage::Unlinked, "Bank connection removed");
        }
        Ok(removed)
    }

    pub async fn stage(&self, user_id: &UserId) -> Result<LinkStage> {
        let stored = self.credential(user_id).await?;
        Ok(if stored.is_some() {
            LinkStage::Connected
        } else {
            LinkStage::Unlinked
        })
    }
}
