//! PageApi - The capability handed to untrusted page code.
//!
//! Holds no key material. Every signature is relayed through the
//! [`MessageBridge`](crate::bridge::MessageBridge), and nothing but
//! `connect()` works until a wallet address has been obtained.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::bridge::{BridgeHandle, Request, Response};
use crate::error::{WalletError, WalletResult};
use crate::ledger::{Ledger, SubmitReceipt};
use crate::types::{validate_amount, UnsignedTransaction};

pub struct PageApi {
    bridge: BridgeHandle,
    ledger: Arc<dyn Ledger>,
    session: RwLock<Option<String>>,
}

impl PageApi {
    pub fn new(bridge: BridgeHandle, ledger: Arc<dyn Ledger>) -> Self {
        Self { bridge, ledger, session: RwLock::new(None) }
    }

    /// Ask the coordinator for the wallet. `None` when no wallet exists yet.
    pub async fn connect(&self) -> WalletResult<Option<String>> {
        let status = match self.bridge.request(Request::GetWalletStatus).await? {
            Response::WalletStatus(status) => status,
            Response::Error(reply) => return Err(WalletError::Bridge(reply.error)),
            other => return Err(WalletError::Bridge(format!("unexpected reply {other:?}"))),
        };
        let address = status.wallet.filter(|_| status.has_wallet).map(|w| w.address);
        *self.session.write().await = address.clone();
        match &address {
            Some(address) => info!(%address, "page connected"),
            None => info!("page connect: no wallet"),
        }
        Ok(address)
    }

    pub async fn is_connected(&self) -> bool {
        self.address().await.is_some()
    }

    pub async fn address(&self) -> Option<String> {
        self.session.read().await.clone()
    }

    async fn connected_address(&self) -> WalletResult<String> {
        self.address().await.ok_or(WalletError::Unauthorized)
    }

    pub async fn sign_transaction(&self, transaction: &UnsignedTransaction) -> WalletResult<String> {
        self.connected_address().await?;
        let request = Request::SignTransaction { transaction: transaction.clone() };
        match self.bridge.request(request).await? {
            Response::Signature(result) if result.success => result
                .signature
                .ok_or_else(|| WalletError::Signing("empty signature".into())),
            Response::Signature(result) => {
                let error = result.error.unwrap_or_default();
                if error == WalletError::Rejected.to_string() {
                    Err(WalletError::Rejected)
                } else {
                    Err(WalletError::Signing(error))
                }
            }
            Response::Error(reply) => Err(WalletError::Bridge(reply.error)),
            other => Err(WalletError::Bridge(format!("unexpected reply {other:?}"))),
        }
    }

    /// Build, sign and submit a transfer from the connected wallet.
    pub async fn send_transaction(&self, to: &str, amount: f64) -> WalletResult<SubmitReceipt> {
        let from = self.connected_address().await?;
        let to = to.trim();
        if to.is_empty() {
            return Err(WalletError::MissingRecipient);
        }
        let amount = validate_amount(amount)?;

        let transaction = UnsignedTransaction::new(from, to, amount);
        let signature = self.sign_transaction(&transaction).await?;
        let receipt = self
            .ledger
            .submit(&transaction.signed(signature))
            .await
            .map_err(|e| {
                warn!(error = %e, "page transaction refused");
                WalletError::submission(e)
            })?;
        info!(to, amount, hash = ?receipt.hash, "page transaction submitted");
        Ok(receipt)
    }

    pub async fn get_balance(&self) -> WalletResult<f64> {
        let address = self.connected_address().await?;
        self.ledger.balance(&address).await.map_err(WalletError::connectivity)
    }
}
