//! Error taxonomy for the linking and sync pipeline.
//!
//! Provider error codes are carried verbatim because callers use them to
//! decide between re-authentication and retry.

/// The external provider rejected or failed a call.
///
/// `status` is the HTTP status of the failed request, or 0 when the request
/// never produced a response (transport failure).
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider request failed ({status}): {message}")]
pub struct ProviderError {
    pub status: u16,
    pub error_code: Option<String>,
    pub error_type: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            error_code: None,
            error_type: None,
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.error_type.as_deref() == Some("RATE_LIMIT_EXCEEDED")
    }

    /// Whether retrying the same request is plausible.
    pub fn is_transient(&self) -> bool {
        self.is_rate_limited() || self.status == 0 || self.status >= 500
    }
}

/// Pagination could not reach a consistent provider total.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transaction sync failed after {fetched} accumulated transactions: {source}")]
    Provider {
        fetched: usize,
        #[source]
        source: ProviderError,
    },
    #[error("transaction sync exceeded {max_pages} pages without reconciling the provider total ({fetched} fetched)")]
    PageLimit { fetched: usize, max_pages: usize },
}

impl SyncError {
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            SyncError::Provider { source, .. } => Some(source),
            SyncError::PageLimit { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid caller input, rejected before any network call.
    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The credential store failed to read or write.
    #[error("credential store failure: {0}")]
    Storage(anyhow::Error),

    /// The interactive authorization flow ended without granting access.
    #[error("account linking was aborted before authorization")]
    LinkAborted,
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
