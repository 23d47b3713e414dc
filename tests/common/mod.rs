//! In-process development ledger for integration tests.
//!
//! One axum server on `127.0.0.1:0` plays both remote services: the node at
//! the root and the simulator under `/sim`. Each can be taken down and brought
//! back independently, and every request is counted.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use driftwallet::WalletConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct LedgerState {
    balances: Mutex<HashMap<String, f64>>,
    transactions: Mutex<Vec<Value>>,
    node_down: AtomicBool,
    simulator_down: AtomicBool,
    requests: AtomicUsize,
    submissions: AtomicUsize,
}

impl LedgerState {
    pub fn balance_of(&self, address: &str) -> f64 {
        self.balances.lock().unwrap().get(address).copied().unwrap_or(0.0)
    }

    pub fn credit(&self, address: &str, amount: f64) -> f64 {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(address.to_string()).or_insert(0.0);
        *balance += amount;
        *balance
    }

    pub fn set_node_up(&self, up: bool) {
        self.node_down.store(!up, Ordering::SeqCst);
    }

    pub fn set_simulator_up(&self, up: bool) {
        self.simulator_down.store(!up, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn last_transaction(&self) -> Option<Value> {
        self.transactions.lock().unwrap().last().cloned()
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn node_up(&self) -> bool {
        !self.node_down.load(Ordering::SeqCst)
    }
}

pub struct MockLedger {
    pub base: String,
    pub state: Arc<LedgerState>,
    task: JoinHandle<()>,
}

impl MockLedger {
    pub async fn spawn() -> Self {
        driftwallet::logging::init_test_logging();
        let state = Arc::new(LedgerState::default());
        let router = Router::new()
            .route("/health", get(node_health))
            .route("/balance/:address", get(balance))
            .route("/transactions/:address", get(transactions))
            .route("/transaction", post(submit))
            .route("/faucet", post(faucet))
            .route("/sim/health", get(simulator_health))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { base: format!("http://{}", addr), state, task }
    }

    pub fn node_url(&self) -> String {
        self.base.clone()
    }

    pub fn simulator_url(&self) -> String {
        format!("{}/sim", self.base)
    }

    /// Config pointed at this ledger with short timers.
    pub fn config(&self, data_dir: &TempDir) -> WalletConfig {
        WalletConfig::default()
            .with_node_url(self.node_url())
            .with_simulator_url(self.simulator_url())
            .with_data_dir(data_dir.path())
            .with_refresh_interval(Duration::from_millis(100))
            .with_health_interval(Duration::from_millis(100))
            .with_request_timeout(Duration::from_secs(2))
    }
}

impl Drop for MockLedger {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type Reply = (StatusCode, Json<Value>);

fn unavailable() -> Reply {
    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"ok": false, "message": "down"})))
}

async fn node_health(State(s): State<Arc<LedgerState>>) -> Reply {
    s.hit();
    if !s.node_up() {
        return unavailable();
    }
    (StatusCode::OK, Json(json!({"ok": true, "message": "node ready"})))
}

async fn simulator_health(State(s): State<Arc<LedgerState>>) -> Reply {
    s.hit();
    if s.simulator_down.load(Ordering::SeqCst) {
        return unavailable();
    }
    (StatusCode::OK, Json(json!({"ok": true})))
}

async fn balance(State(s): State<Arc<LedgerState>>, Path(address): Path<String>) -> Reply {
    s.hit();
    if !s.node_up() {
        return unavailable();
    }
    (StatusCode::OK, Json(json!({"balance": s.balance_of(&address)})))
}

async fn transactions(State(s): State<Arc<LedgerState>>, Path(address): Path<String>) -> Reply {
    s.hit();
    if !s.node_up() {
        return unavailable();
    }
    let entries: Vec<Value> = s
        .transactions
        .lock()
        .unwrap()
        .iter()
        .filter(|tx| tx["from"] == address.as_str() || tx["to"] == address.as_str())
        .cloned()
        .collect();
    (StatusCode::OK, Json(json!({"transactions": entries})))
}

async fn submit(State(s): State<Arc<LedgerState>>, Json(tx): Json<Value>) -> Reply {
    s.hit();
    s.submissions.fetch_add(1, Ordering::SeqCst);
    if !s.node_up() {
        return unavailable();
    }
    let (Some(from), Some(to), Some(amount)) = (tx["from"].as_str(), tx["to"].as_str(), tx["amount"].as_f64()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": "malformed transaction"})));
    };
    if tx["signature"].as_str().map_or(true, str::is_empty) {
        return (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": "missing signature"})));
    }

    {
        let mut balances = s.balances.lock().unwrap();
        let available = balances.get(from).copied().unwrap_or(0.0);
        if available < amount {
            return (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": "insufficient funds"})));
        }
        balances.insert(from.to_string(), available - amount);
        *balances.entry(to.to_string()).or_insert(0.0) += amount;
    }

    let hash = format!("tx{:04}", s.submissions());
    let mut entry = tx.clone();
    entry["hash"] = json!(hash);
    s.transactions.lock().unwrap().push(entry);
    (StatusCode::OK, Json(json!({"success": true, "hash": hash})))
}

async fn faucet(State(s): State<Arc<LedgerState>>, Json(body): Json<Value>) -> Reply {
    s.hit();
    if !s.node_up() {
        return unavailable();
    }
    let (Some(address), Some(amount)) = (body["address"].as_str(), body["amount"].as_f64()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "address and amount required"})));
    };
    let balance = s.credit(address, amount);
    (StatusCode::OK, Json(json!({"status": "ok", "balance": balance})))
}

/// Poll `check` every 20ms until it holds or `within` elapses.
pub async fn eventually<F: FnMut() -> bool>(within: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
