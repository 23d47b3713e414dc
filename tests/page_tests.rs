//! Integration Tests: page capability over a running message bridge
//!
//! These tests verify:
//! 1. Nothing but connect() works before a wallet address was obtained
//! 2. Faucet credit is visible through get_balance
//! 3. A page-initiated send moves funds between two wallets
//! 4. Unknown bridge messages are refused explicitly
//! 5. A refusing approval hook surfaces as a rejection

mod common;

use common::{eventually, MockLedger};
use driftwallet::error::UNAUTHORIZED_MESSAGE;
use driftwallet::{
    BridgeHandle, DenyAll, HealthMonitor, HttpLedger, Ledger, MessageBridge, PageApi, Request,
    Response, Shutdown, TransactionSubmitter, UnsignedTransaction, WalletConfig, WalletError,
    WalletStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WITHIN: Duration = Duration::from_secs(3);

struct Coordinator {
    _dir: TempDir,
    config: WalletConfig,
    store: Arc<WalletStore>,
    ledger: Arc<dyn Ledger>,
    bridge: BridgeHandle,
    _shutdown: Shutdown,
}

fn start(mock: &MockLedger, bridge: impl FnOnce(MessageBridge) -> MessageBridge) -> Coordinator {
    let dir = TempDir::new().expect("tempdir");
    let config = mock.config(&dir);
    let store = Arc::new(WalletStore::open(&config.data_dir).expect("store"));
    let ledger: Arc<dyn Ledger> = Arc::new(HttpLedger::from_config(&config).expect("ledger"));
    let health = Arc::new(HealthMonitor::new(ledger.clone()).with_store(store.clone()));
    let shutdown = Shutdown::new();
    let (handle, _task) = bridge(MessageBridge::new(store.clone(), health, &config)).spawn(shutdown.subscribe());
    Coordinator { _dir: dir, config, store, ledger, bridge: handle, _shutdown: shutdown }
}

impl Coordinator {
    fn page(&self) -> PageApi {
        PageApi::new(self.bridge.clone(), self.ledger.clone())
    }

    fn submitter(&self) -> TransactionSubmitter {
        TransactionSubmitter::new(self.store.clone(), self.ledger.clone())
    }
}

/// Test: sign and balance before connect fail with the fixed message
#[tokio::test]
async fn page_requires_connect() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b);
    let address = coordinator.store.create().expect("wallet").address;
    let page = coordinator.page();

    let err = page
        .sign_transaction(&UnsignedTransaction::new(&address, "bb", 1.0))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), UNAUTHORIZED_MESSAGE);
    assert!(matches!(page.get_balance().await, Err(WalletError::Unauthorized)));
    assert!(matches!(page.send_transaction("bb", 1.0).await, Err(WalletError::Unauthorized)));
    assert_eq!(mock.state.submissions(), 0);

    assert_eq!(page.connect().await.unwrap(), Some(address.clone()));
    assert!(page.is_connected().await);
    assert_eq!(page.address().await.as_deref(), Some(address.as_str()));
    assert!(page.sign_transaction(&UnsignedTransaction::new(&address, "bb", 1.0)).await.is_ok());
}

/// Test: connect without a wallet stays disconnected
#[tokio::test]
async fn connect_without_wallet() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b);
    let page = coordinator.page();

    assert_eq!(page.connect().await.unwrap(), None);
    assert!(!page.is_connected().await);
    assert!(matches!(page.get_balance().await, Err(WalletError::Unauthorized)));
}

/// Test: faucet 100 then get_balance reports at least 100
#[tokio::test]
async fn faucet_then_balance() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b);
    coordinator.store.create().expect("wallet");

    let receipt = coordinator.submitter().request_faucet(100.0).await.expect("faucet");
    assert_eq!(receipt.balance, Some(100.0));
    assert_eq!(coordinator.store.load().unwrap().unwrap().balance, 100.0);

    let page = coordinator.page();
    page.connect().await.unwrap();
    assert!(page.get_balance().await.unwrap() >= 100.0);
}

/// Test: send A from W1 to W2 is reflected in both balances
#[tokio::test]
async fn page_send_between_wallets() {
    let mock = MockLedger::spawn().await;
    let w1 = start(&mock, |b| b);
    let w2 = start(&mock, |b| b);
    w1.store.create().expect("w1");
    let w2_address = w2.store.create().expect("w2").address;

    w1.submitter().request_faucet(100.0).await.expect("faucet");

    let page = w1.page();
    page.connect().await.unwrap();
    let receipt = page.send_transaction(&w2_address, 30.0).await.expect("send");
    assert!(receipt.hash.is_some());

    assert_eq!(page.get_balance().await.unwrap(), 70.0);
    let w2_page = w2.page();
    w2_page.connect().await.unwrap();
    assert_eq!(w2_page.get_balance().await.unwrap(), 30.0);

    let recorded = mock.state.last_transaction().expect("recorded");
    assert_eq!(recorded["to"], w2_address.as_str());
    assert!(recorded["nonce"].as_str().is_some_and(|n| !n.is_empty()));
    assert!(recorded["signature"].as_str().is_some_and(|s| s.len() == 64));
}

/// Test: ledger refusal surfaces as a submission error
#[tokio::test]
async fn page_send_insufficient_funds() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b);
    coordinator.store.create().expect("wallet");
    let page = coordinator.page();
    page.connect().await.unwrap();

    let err = page.send_transaction("bb", 5.0).await.unwrap_err();
    assert!(matches!(err, WalletError::Submission(ref m) if m.contains("insufficient funds")));

    let err = page.send_transaction("bb", -5.0).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidAmount(_)));
    assert_eq!(mock.state.submissions(), 1);
}

/// Test: unknown message kinds are refused, not dropped
#[tokio::test]
async fn unknown_bridge_message() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b);

    let err = coordinator.bridge.message(json!({"type": "EXPORT_SEED"})).await.unwrap_err();
    assert!(matches!(err, WalletError::Unsupported(ref kind) if kind == "EXPORT_SEED"));

    let response = coordinator.bridge.message(json!({"type": "NODE_HEALTH_CHECK"})).await.unwrap();
    assert!(matches!(response, Response::Health(ref h) if h.connected && h.status == Some(200)));
}

/// Test: a denying approver turns SIGN_TRANSACTION into a rejection
#[tokio::test]
async fn denied_signature_is_rejected() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b.with_approver(Arc::new(DenyAll)));
    let address = coordinator.store.create().expect("wallet").address;
    let page = coordinator.page();
    page.connect().await.unwrap();

    let err = page.sign_transaction(&UnsignedTransaction::new(&address, "bb", 1.0)).await.unwrap_err();
    assert!(matches!(err, WalletError::Rejected));

    let response = coordinator
        .bridge
        .request(Request::GetWalletStatus)
        .await
        .unwrap();
    assert!(matches!(response, Response::WalletStatus(ref s) if s.has_wallet));
    assert_eq!(coordinator.config.node_url, mock.node_url());
}

/// Test: the bridge's own timer probes both services into the store cache
#[tokio::test]
async fn bridge_timer_caches_health() {
    let mock = MockLedger::spawn().await;
    let coordinator = start(&mock, |b| b);
    let cached = |store: &WalletStore| store.health().ok().flatten();

    assert!(
        eventually(WITHIN, || cached(&coordinator.store)
            .is_some_and(|h| h.node.connected && h.simulator.connected))
        .await
    );

    mock.state.set_node_up(false);
    assert!(
        eventually(WITHIN, || cached(&coordinator.store)
            .is_some_and(|h| !h.node.connected && h.simulator.connected))
        .await
    );

    mock.state.set_simulator_up(false);
    assert!(eventually(WITHIN, || cached(&coordinator.store).is_some_and(|h| !h.simulator.connected)).await);
    assert!(coordinator.store.load().unwrap().is_none());
}
