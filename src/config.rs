use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Which provider deployment the client talks to. Each one has its own host
/// and its own credential set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderEnvironment {
    Sandbox,
    Development,
    Production,
}

impl ProviderEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.plaid.com",
            Self::Development => "https://development.plaid.com",
            Self::Production => "https://production.plaid.com",
        }
    }
}

impl fmt::Display for ProviderEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sandbox => "sandbox",
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}

impl FromStr for ProviderEnvironment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => anyhow::bail!(
                "unknown provider environment {other:?} (one of sandbox, development or production required)"
            ),
        }
    }
}

/// Explicit provider configuration, injected into the client at construction.
///
/// Nothing here is read from the process environment at call time; tests run
/// against a fake provider without any environment coupling.
#[derive(Clone)]
pub struct ProviderConfig {
    pub client_id: SecretString,
    pub secret: SecretString,
    pub environment: ProviderEnvironment,
}

impl ProviderConfig {
    pub fn new(
        client_id: SecretString,
        secret: SecretString,
        environment: ProviderEnvironment,
    ) -> Self {
        Self {
            client_id,
            secret,
            environment,
        }
    }

    /// Load from `PLAID_CLIENT_ID`, `PLAID_SECRET` and optional `PLAID_ENV`
    /// (defaults to sandbox). Intended for the server binary only.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("PLAID_CLIENT_ID")
            .context("Missing PLAID_CLIENT_ID in environment")?;
        let secret =
            std::env::var("PLAID_SECRET").context("Missing PLAID_SECRET in environment")?;
        let environment = match std::env::var("PLAID_ENV") {
            Ok(raw) => raw.parse::<ProviderEnvironment>()?,
            Err(_) => ProviderEnvironment::Sandbox,
        };

        Ok(Self::new(
            SecretString::from(client_id),
            SecretString::from(secret),
            environment,
        ))
    }
}
