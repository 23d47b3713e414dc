//! Driftwallet: a client-side wallet engine for a development ledger.
//!
//! # Architecture
//!
//! ```text
//! Coordinator (one per process)
//!   │
//!   ├── WalletStore (wallet.json: version, wallet, health cache)
//!   │     └── vault (secret → address, identity, HMAC signatures)
//!   │
//!   ├── MessageBridge (mpsc + oneshot, 30s health timer)
//!   │     ├── SigningService ← Approver hook
//!   │     └── HealthMonitor ──→ Ledger (GET /health)
//!   │
//!   └── Surfaces
//!         ├── PageApi (untrusted page: connect, sign, send, balance)
//!         ├── TransactionSubmitter (trusted send form, faucet)
//!         └── SyncScheduler (10s balance/history, 30s health)
//! ```
//!
//! # Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | SeedVault | [`vault`] | Secret generation, derivations, signatures |
//! | WalletStateStore | [`store`] | Durable versioned wallet record |
//! | MessageBridge | [`bridge`] | Typed request relay to the coordinator |
//! | PageAPI | [`page`] | Capability exposed to page code |
//! | SyncScheduler | [`sync`] | Polling with in-flight guards |
//! | TransactionSubmitter | [`submitter`] | Validated sends from a trusted surface |
//!
//! # Features
//!
//! - `server` (default) - axum HTTP surface relaying bridge messages, and the CLI
//!
//! # Usage
//!
//! ```ignore
//! use driftwallet::{HealthMonitor, HttpLedger, MessageBridge, PageApi, Shutdown, WalletConfig, WalletStore};
//! use std::sync::Arc;
//!
//! let config = WalletConfig::from_env();
//! let store = Arc::new(WalletStore::open(&config.data_dir)?);
//! store.create()?;
//! let ledger = Arc::new(HttpLedger::from_config(&config)?);
//! let health = Arc::new(HealthMonitor::new(ledger.clone()).with_store(store.clone()));
//!
//! let shutdown = Shutdown::new();
//! let (bridge, _task) = MessageBridge::new(store, health, &config).spawn(shutdown.subscribe());
//! let page = PageApi::new(bridge, ledger);
//! let address = page.connect().await?;
//! page.send_transaction("3f2a...", 5.0).await?;
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod health;
pub mod ledger;
pub mod logging;
pub mod page;
pub mod runtime;
pub mod signing;
pub mod store;
pub mod submitter;
pub mod sync;
pub mod types;
pub mod vault;

#[cfg(feature = "server")]
pub mod server;

// =============================================================================
// Re-exports
// =============================================================================
pub use bridge::{Approver, AutoApprove, BridgeHandle, DenyAll, MessageBridge, Request, Response};
pub use config::WalletConfig;
pub use error::{WalletError, WalletResult};
pub use health::{HealthMonitor, HealthSnapshot, ServiceHealth};
pub use ledger::{HttpLedger, Ledger, LedgerError, Service};
pub use page::PageApi;
pub use runtime::{install_signal_handlers, Shutdown};
pub use signing::SigningService;
pub use store::WalletStore;
pub use submitter::{SendForm, TransactionSubmitter};
pub use sync::{RefreshTrigger, SurfaceState, SyncHandle, SyncScheduler};
pub use types::{TransactionRecord, UnsignedTransaction, WalletRecord, WalletView};
pub use vault::Secret;

#[cfg(feature = "server")]
pub use server::{create_router, create_router_with_name};
