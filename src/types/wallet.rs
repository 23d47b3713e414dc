//! WalletRecord - the single persisted wallet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vault::{self, Secret, VaultResult};

/// Persisted wallet. Address, identity and secret never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: String,
    #[serde(rename = "publicKey")]
    pub public_identity: String,
    #[serde(rename = "privateKey")]
    pub secret: Secret,
    pub balance: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    /// Fresh record for a newly generated secret, zero balance.
    pub fn generate() -> VaultResult<Self> {
        Ok(Self::from_secret(vault::generate_secret()?))
    }

    pub fn from_secret(secret: Secret) -> Self {
        Self {
            address: vault::derive_address(&secret),
            public_identity: vault::derive_identity(&secret),
            secret,
            balance: 0.0,
            created_at: Utc::now(),
        }
    }

    /// The shape handed to other surfaces; carries no secret.
    pub fn public_view(&self) -> WalletView {
        WalletView {
            address: self.address.clone(),
            public_identity: self.public_identity.clone(),
            balance: self.balance,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletView {
    pub address: String,
    #[serde(rename = "publicKey")]
    pub public_identity: String,
    pub balance: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A snapshot tagged with the store version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}
