//! TransactionSubmitter - The trusted send form of a wallet surface.
//!
//! Validation happens before anything leaves the process. A form is only
//! cleared after the ledger accepted the transfer, so a failed send can be
//! retried by the user without retyping.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{WalletError, WalletResult};
use crate::ledger::{FaucetReceipt, Ledger, SubmitReceipt};
use crate::signing::SigningService;
use crate::store::WalletStore;
use crate::sync::RefreshTrigger;
use crate::types::{parse_amount, validate_amount, UnsignedTransaction};

/// Raw user input as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendForm {
    pub to: String,
    pub amount: String,
}

impl SendForm {
    pub fn new(to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self { to: to.into(), amount: amount.into() }
    }

    pub fn clear(&mut self) {
        self.to.clear();
        self.amount.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.amount.is_empty()
    }

    fn validate(&self) -> WalletResult<(String, f64)> {
        let to = self.to.trim();
        if to.is_empty() {
            return Err(WalletError::MissingRecipient);
        }
        Ok((to.to_string(), parse_amount(&self.amount)?))
    }
}

pub struct TransactionSubmitter {
    store: Arc<WalletStore>,
    signer: SigningService,
    ledger: Arc<dyn Ledger>,
    refresh: Option<RefreshTrigger>,
}

impl TransactionSubmitter {
    pub fn new(store: Arc<WalletStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self { signer: SigningService::new(store.clone()), store, ledger, refresh: None }
    }

    /// Kick the surface's scheduler after every successful write.
    pub fn with_refresh(mut self, trigger: RefreshTrigger) -> Self {
        self.refresh = Some(trigger);
        self
    }

    pub async fn submit(&self, form: &mut SendForm) -> WalletResult<SubmitReceipt> {
        let (to, amount) = form.validate()?;
        let from = self.wallet_address().await?;

        let signer = self.signer.clone();
        let unsigned = UnsignedTransaction::new(from, &to, amount);
        let record = tokio::task::spawn_blocking(move || signer.sign_record(unsigned))
            .await
            .map_err(|e| WalletError::Signing(format!("signing task: {e}")))??;
        let receipt = match self.ledger.submit(&record).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(%to, amount, error = %e, "transaction submission failed");
                return Err(WalletError::submission(e));
            }
        };

        info!(%to, amount, hash = ?receipt.hash, "transaction submitted");
        form.clear();
        self.kick();
        Ok(receipt)
    }

    /// Ask the simulator to credit this wallet.
    pub async fn request_faucet(&self, amount: f64) -> WalletResult<FaucetReceipt> {
        let amount = validate_amount(amount)?;
        let address = self.wallet_address().await?;
        let receipt = self.ledger.faucet(&address, amount).await.map_err(|e| {
            warn!(%address, error = %e, "faucet request failed");
            WalletError::submission(e)
        })?;

        if let Some(balance) = receipt.balance {
            self.store.run_blocking(move |s| s.set_balance(balance)).await?;
        }
        info!(%address, amount, status = %receipt.status, "faucet credited");
        self.kick();
        Ok(receipt)
    }

    async fn wallet_address(&self) -> WalletResult<String> {
        let wallet = self.store.run_blocking(|s| s.load()).await?;
        Ok(wallet.ok_or(WalletError::NoWallet)?.address)
    }

    fn kick(&self) {
        if let Some(trigger) = &self.refresh {
            trigger.refresh_now();
        }
    }
}
