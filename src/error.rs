//! Error taxonomy shared by every surface.
//!
//! Module-level errors (`VaultError`, `StoreError`, `LedgerError`) fold into
//! [`WalletError`], which is what callers of the page capability, the bridge
//! and the submitter see.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::store::StoreError;
use crate::vault::VaultError;

pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized: call connect() first";

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Health probes, balance and history fetches.
    #[error("connectivity: {0}")]
    Connectivity(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// Non-success response from `POST /transaction` or `POST /faucet`.
    #[error("submission failed: {0}")]
    Submission(String),

    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("missing recipient")]
    MissingRecipient,

    #[error("no wallet")]
    NoWallet,

    #[error("unsupported request: {0}")]
    Unsupported(String),

    #[error("bridge: {0}")]
    Bridge(String),

    #[error("signing request rejected")]
    Rejected,
}

impl WalletError {
    pub fn connectivity(err: LedgerError) -> Self {
        Self::Connectivity(err.to_string())
    }

    pub fn submission(err: LedgerError) -> Self {
        Self::Submission(err.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
