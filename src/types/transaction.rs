//! Transactions: the unsigned body that gets signed, and the submitted record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{WalletError, WalletResult};

/// Signed body. Field order here is the canonical serialization order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub timestamp: i64,
    pub nonce: String,
}

impl UnsignedTransaction {
    /// Stamp with the current time and a random nonce.
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            timestamp: now_millis(),
            nonce: generate_nonce(),
        }
    }

    pub fn signed(self, signature: impl Into<String>) -> TransactionRecord {
        TransactionRecord {
            from: self.from,
            to: self.to,
            amount: self.amount,
            timestamp: self.timestamp,
            nonce: self.nonce,
            signature: signature.into(),
        }
    }
}

/// Body of `POST /transaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

impl TransactionRecord {
    pub fn unsigned(&self) -> UnsignedTransaction {
        UnsignedTransaction {
            from: self.from.clone(),
            to: self.to.clone(),
            amount: self.amount,
            timestamp: self.timestamp,
            nonce: self.nonce.clone(),
        }
    }
}

/// One entry of `GET /transactions/{address}`. The ledger owns this shape, so
/// anything beyond the common fields is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn generate_nonce() -> String {
    format!("{:016x}", rand::random::<u64>())
}

pub fn validate_amount(amount: f64) -> WalletResult<f64> {
    if !amount.is_finite() {
        return Err(WalletError::InvalidAmount(format!("{amount} is not a number")));
    }
    if amount <= 0.0 {
        return Err(WalletError::InvalidAmount(format!("{amount} must be positive")));
    }
    Ok(amount)
}

/// Parse raw form input. Empty input counts as a missing amount.
pub fn parse_amount(raw: &str) -> WalletResult<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(WalletError::InvalidAmount("amount is required".into()));
    }
    let amount: f64 = raw
        .parse()
        .map_err(|_| WalletError::InvalidAmount(format!("'{raw}' is not a number")))?;
    validate_amount(amount)
}
