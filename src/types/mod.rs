//! Shared records: the wallet singleton and the per-send transaction.

mod transaction;
mod wallet;

pub use transaction::{
    generate_nonce, now_millis, parse_amount, validate_amount, HistoryEntry, TransactionRecord,
    UnsignedTransaction,
};
pub use wallet::{Versioned, WalletRecord, WalletView};
