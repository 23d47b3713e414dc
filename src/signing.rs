//! The one signing path. The bridge uses it for page-hosted callers, trusted
//! UI surfaces call it directly; both end in [`SigningService::sign`].

use std::sync::Arc;
use tracing::debug;

use crate::error::{WalletError, WalletResult};
use crate::store::{StoreError, WalletStore};
use crate::types::{validate_amount, TransactionRecord, UnsignedTransaction};
use crate::vault;

#[derive(Clone)]
pub struct SigningService {
    store: Arc<WalletStore>,
}

impl SigningService {
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// Sign a positive, finite transfer sent from this wallet's own address.
    pub fn sign(&self, transaction: &UnsignedTransaction) -> WalletResult<String> {
        validate_amount(transaction.amount)?;
        let wallet = self.store.load()?.ok_or(WalletError::NoWallet)?;
        if transaction.from != wallet.address {
            return Err(WalletError::Signing(format!(
                "sender {} is not this wallet",
                transaction.from
            )));
        }
        let signature = vault::sign(&wallet.secret, transaction)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        debug!(to = %transaction.to, amount = transaction.amount, nonce = %transaction.nonce, "transaction signed");
        Ok(signature)
    }

    pub fn sign_record(&self, transaction: UnsignedTransaction) -> WalletResult<TransactionRecord> {
        let signature = self.sign(&transaction)?;
        Ok(transaction.signed(signature))
    }

    /// Recompute and compare; false for foreign or altered records.
    pub fn verify(&self, record: &TransactionRecord) -> WalletResult<bool> {
        let secret = match self.store.secret() {
            Ok(secret) => secret,
            Err(StoreError::NoWallet) => return Err(WalletError::NoWallet),
            Err(e) => return Err(e.into()),
        };
        Ok(vault::verify(&secret, &record.unsigned(), &record.signature))
    }
}
