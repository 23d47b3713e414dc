//! Remote ledger client - JSON over HTTP polling.
//!
//! | Method | Path | Reply |
//! |--------|------|-------|
//! | GET | `{node}/health`, `{simulator}/health` | `{ok, message?}` |
//! | GET | `/balance/{address}` | `{balance}` |
//! | GET | `/transactions/{address}` | `{transactions: [...]}` |
//! | POST | `/transaction` | `{success\|ok, hash?, error?}` |
//! | POST | `/faucet` | `{status, balance?}` |
//!
//! Surfaces talk to the ledger through the [`Ledger`] trait so tests and
//! alternative transports can stand in for [`HttpLedger`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::WalletConfig;
use crate::types::{HistoryEntry, TransactionRecord};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LedgerError::Decode(err.to_string())
        } else {
            LedgerError::Transport(err.to_string())
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which liveness endpoint to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Node,
    Simulator,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Node => "node",
            Service::Simulator => "simulator",
        }
    }
}

/// Outcome of a `/health` request that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReply {
    pub status: u16,
    pub ok: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaucetReceipt {
    pub status: String,
    pub balance: Option<f64>,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn health(&self, service: Service) -> LedgerResult<ProbeReply>;
    async fn balance(&self, address: &str) -> LedgerResult<f64>;
    async fn transactions(&self, address: &str) -> LedgerResult<Vec<HistoryEntry>>;
    async fn submit(&self, transaction: &TransactionRecord) -> LedgerResult<SubmitReceipt>;
    async fn faucet(&self, address: &str, amount: f64) -> LedgerResult<FaucetReceipt>;
}

#[derive(Deserialize)]
struct HealthReply {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct BalanceReply {
    balance: f64,
}

#[derive(Deserialize)]
struct TransactionsReply {
    #[serde(default)]
    transactions: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
struct SubmitReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FaucetReply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    balance: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// reqwest-backed [`Ledger`].
#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: reqwest::Client,
    node_url: String,
    simulator_url: String,
}

impl HttpLedger {
    pub fn new(node_url: impl Into<String>, simulator_url: impl Into<String>, timeout: Duration) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("client: {e}")))?;
        Ok(Self {
            client,
            node_url: trim_base(node_url.into()),
            simulator_url: trim_base(simulator_url.into()),
        })
    }

    pub fn from_config(config: &WalletConfig) -> LedgerResult<Self> {
        Self::new(&config.node_url, &config.simulator_url, config.request_timeout)
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    fn base(&self, service: Service) -> &str {
        match service {
            Service::Node => &self.node_url,
            Service::Simulator => &self.simulator_url,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> LedgerResult<T> {
        debug!(%url, "ledger GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn health(&self, service: Service) -> LedgerResult<ProbeReply> {
        let url = format!("{}/health", self.base(service));
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        // Body is advisory; a liveness endpoint may answer with plain text.
        let reply: Option<HealthReply> = response.json().await.ok();
        let (ok, message) = match reply {
            Some(r) => (status.is_success() && r.ok.unwrap_or(true), r.message),
            None => (status.is_success(), None),
        };
        Ok(ProbeReply { status: status.as_u16(), ok, message })
    }

    async fn balance(&self, address: &str) -> LedgerResult<f64> {
        let reply: BalanceReply = self.get_json(&format!("{}/balance/{}", self.node_url, address)).await?;
        Ok(reply.balance)
    }

    async fn transactions(&self, address: &str) -> LedgerResult<Vec<HistoryEntry>> {
        let reply: TransactionsReply =
            self.get_json(&format!("{}/transactions/{}", self.node_url, address)).await?;
        Ok(reply.transactions)
    }

    async fn submit(&self, transaction: &TransactionRecord) -> LedgerResult<SubmitReceipt> {
        let url = format!("{}/transaction", self.node_url);
        debug!(%url, to = %transaction.to, amount = transaction.amount, "ledger POST transaction");
        let response = self.client.post(&url).json(transaction).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let reply: Option<SubmitReply> = serde_json::from_str(&body).ok();

        match reply {
            Some(r) if status.is_success() && r.success.or(r.ok).unwrap_or(true) => {
                Ok(SubmitReceipt { hash: r.hash })
            }
            Some(SubmitReply { error: Some(error), .. }) => Err(LedgerError::Rejected(error)),
            Some(_) if status.is_success() => Err(LedgerError::Rejected("ledger reported failure".into())),
            None if status.is_success() => Err(LedgerError::Decode(format!("unexpected reply: {body}"))),
            _ => Err(LedgerError::Status { status: status.as_u16(), body }),
        }
    }

    async fn faucet(&self, address: &str, amount: f64) -> LedgerResult<FaucetReceipt> {
        let url = format!("{}/faucet", self.node_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({"address": address, "amount": amount}))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let error = serde_json::from_str::<FaucetReply>(&body).ok().and_then(|r| r.error);
            return Err(match error {
                Some(error) => LedgerError::Rejected(error),
                None => LedgerError::Status { status: status.as_u16(), body },
            });
        }
        let reply: FaucetReply = serde_json::from_str(&body).map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(FaucetReceipt { status: reply.status.unwrap_or_else(|| "ok".into()), balance: reply.balance })
    }
}
