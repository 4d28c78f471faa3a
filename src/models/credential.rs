use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Application-side user identifier. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> crate::Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(crate::Error::invalid_argument("userId must be non-empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Durable, opaque secret authorizing data calls for a linked account.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// The durable result of one successful link handshake.
///
/// Created by the connection manager, borrowed by the sync engine, deleted
/// only on explicit disconnect. At most one per user.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: UserId,
    pub access_token: AccessToken,
    pub item_id: String,
}
