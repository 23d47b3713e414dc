//! MessageBridge - Long-lived coordinator relaying typed requests.
//!
//! # Architecture
//!
//! ```text
//! PageApi / HTTP /bridge / other surfaces
//!     │  BridgeHandle::request(Request)
//!     ▼
//! mpsc ──→ bridge task ──→ one task per request ──→ oneshot reply
//!              │
//!              └── health timer (30s) ──→ HealthMonitor::probe_all ──→ store cache
//! ```
//!
//! # Requests
//!
//! | `type` | Payload | Response |
//! |--------|---------|----------|
//! | `GET_WALLET_STATUS` | - | `{hasWallet, wallet}` (no secret) |
//! | `NODE_HEALTH_CHECK` | - | `{connected, status?, error?}` |
//! | `SIMULATOR_HEALTH_CHECK` | - | `{connected, status?, error?}` |
//! | `SIGN_TRANSACTION` | `{transaction}` | `{success, signature?, error?}` |
//!
//! Anything else is answered with an explicit `unsupported request` error.

mod approval;

pub use approval::{ApproveFuture, ApproveWith, Approver, AutoApprove, DenyAll};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::health::{HealthMonitor, ServiceHealth};
use crate::ledger::Service;
use crate::signing::SigningService;
use crate::store::WalletStore;
use crate::types::{UnsignedTransaction, WalletView};

const CHANNEL_CAPACITY: usize = 64;

const KNOWN_KINDS: &[&str] = &[
    "GET_WALLET_STATUS",
    "NODE_HEALTH_CHECK",
    "SIMULATOR_HEALTH_CHECK",
    "SIGN_TRANSACTION",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetWalletStatus,
    NodeHealthCheck,
    SimulatorHealthCheck,
    SignTransaction { transaction: UnsignedTransaction },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GetWalletStatus => "GET_WALLET_STATUS",
            Request::NodeHealthCheck => "NODE_HEALTH_CHECK",
            Request::SimulatorHealthCheck => "SIMULATOR_HEALTH_CHECK",
            Request::SignTransaction { .. } => "SIGN_TRANSACTION",
        }
    }

    /// Parse an untyped message. Unknown kinds are `Unsupported`; known kinds
    /// with a bad payload are a `Bridge` error.
    pub fn from_message(message: Value) -> WalletResult<Self> {
        let kind = message
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("<missing>")
            .to_string();
        serde_json::from_value(message).map_err(|e| {
            if KNOWN_KINDS.contains(&kind.as_str()) {
                WalletError::Bridge(format!("malformed {kind}: {e}"))
            } else {
                WalletError::Unsupported(kind)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletStatus {
    #[serde(rename = "hasWallet")]
    pub has_wallet: bool,
    pub wallet: Option<WalletView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ServiceHealth> for HealthStatus {
    fn from(health: ServiceHealth) -> Self {
        Self { connected: health.connected, status: health.status, error: health.error }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    WalletStatus(WalletStatus),
    Health(HealthStatus),
    Signature(SignatureResult),
    Error(ErrorReply),
}

impl Response {
    fn error(err: impl ToString) -> Self {
        Response::Error(ErrorReply { error: err.to_string() })
    }
}

pub struct MessageBridge {
    store: Arc<WalletStore>,
    signer: SigningService,
    health: Arc<HealthMonitor>,
    approver: Arc<dyn Approver>,
    health_interval: Duration,
}

impl MessageBridge {
    pub fn new(store: Arc<WalletStore>, health: Arc<HealthMonitor>, config: &WalletConfig) -> Self {
        Self {
            signer: SigningService::new(store.clone()),
            store,
            health,
            approver: Arc::new(AutoApprove),
            health_interval: config.health_interval,
        }
    }

    pub fn with_approver(mut self, approver: Arc<dyn Approver>) -> Self {
        self.approver = approver;
        self
    }

    pub async fn handle(&self, request: Request) -> Response {
        debug!(kind = request.kind(), "bridge request");
        match request {
            Request::GetWalletStatus => match self.store.run_blocking(|s| s.load()).await {
                Ok(wallet) => Response::WalletStatus(WalletStatus {
                    has_wallet: wallet.is_some(),
                    wallet: wallet.map(|w| w.public_view()),
                }),
                Err(e) => {
                    warn!(error = %e, "wallet status read failed");
                    Response::error(e)
                }
            },
            Request::NodeHealthCheck => Response::Health(self.health.probe(Service::Node).await.into()),
            Request::SimulatorHealthCheck => {
                Response::Health(self.health.probe(Service::Simulator).await.into())
            }
            Request::SignTransaction { transaction } => Response::Signature(self.sign(&transaction).await),
        }
    }

    /// Entry point for untyped messages.
    pub async fn handle_message(&self, message: Value) -> Response {
        match Request::from_message(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "bridge message refused");
                Response::error(e)
            }
        }
    }

    async fn sign(&self, transaction: &UnsignedTransaction) -> SignatureResult {
        if !self.approver.approve(transaction).await {
            info!(to = %transaction.to, amount = transaction.amount, "signing request rejected");
            return SignatureResult {
                success: false,
                signature: None,
                error: Some(WalletError::Rejected.to_string()),
            };
        }
        let (signer, unsigned) = (self.signer.clone(), transaction.clone());
        let signed = tokio::task::spawn_blocking(move || signer.sign(&unsigned))
            .await
            .unwrap_or_else(|e| Err(WalletError::Signing(format!("signing task: {e}"))));
        match signed {
            Ok(signature) => SignatureResult { success: true, signature: Some(signature), error: None },
            Err(e) => {
                warn!(error = %e, "relayed signing failed");
                SignatureResult { success: false, signature: None, error: Some(e.to_string()) }
            }
        }
    }

    /// Run the bridge until shutdown or until every handle is dropped.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> (BridgeHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        let bridge = Arc::new(self);

        let task = tokio::spawn(async move {
            let mut health = tokio::time::interval(bridge.health_interval);
            health.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(health_ms = bridge.health_interval.as_millis() as u64, "message bridge started");

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    envelope = rx.recv() => {
                        let Some(Envelope { request, reply }) = envelope else { break };
                        let bridge = bridge.clone();
                        tokio::spawn(async move {
                            let response = bridge.handle(request).await;
                            if reply.send(response).is_err() {
                                debug!("bridge caller went away before reply");
                            }
                        });
                    }
                    _ = health.tick() => {
                        let bridge = bridge.clone();
                        tokio::spawn(async move {
                            let snapshot = bridge.health.probe_all().await;
                            debug!(node = snapshot.node.connected, simulator = snapshot.simulator.connected, "bridge health probe");
                        });
                    }
                }
            }
            info!("message bridge stopped");
        });

        (BridgeHandle { tx }, task)
    }
}

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Cloneable sender side of a running bridge.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Envelope>,
}

impl BridgeHandle {
    pub async fn request(&self, request: Request) -> WalletResult<Response> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| WalletError::Bridge("closed".into()))?;
        response.await.map_err(|_| WalletError::Bridge("closed".into()))
    }

    pub async fn message(&self, message: Value) -> WalletResult<Response> {
        self.request(Request::from_message(message)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FaucetReceipt, Ledger, LedgerError, LedgerResult, ProbeReply, SubmitReceipt};
    use crate::types::{HistoryEntry, TransactionRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct OfflineLedger;

    #[async_trait]
    impl Ledger for OfflineLedger {
        async fn health(&self, _: Service) -> LedgerResult<ProbeReply> {
            Err(LedgerError::Transport("offline".into()))
        }
        async fn balance(&self, _: &str) -> LedgerResult<f64> {
            Err(LedgerError::Transport("offline".into()))
        }
        async fn transactions(&self, _: &str) -> LedgerResult<Vec<HistoryEntry>> {
            Err(LedgerError::Transport("offline".into()))
        }
        async fn submit(&self, _: &TransactionRecord) -> LedgerResult<SubmitReceipt> {
            Err(LedgerError::Transport("offline".into()))
        }
        async fn faucet(&self, _: &str, _: f64) -> LedgerResult<FaucetReceipt> {
            Err(LedgerError::Transport("offline".into()))
        }
    }

    fn bridge() -> (TempDir, Arc<WalletStore>, MessageBridge) {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(WalletStore::open(dir.path()).expect("store"));
        let health = Arc::new(HealthMonitor::new(Arc::new(OfflineLedger)));
        let bridge = MessageBridge::new(store.clone(), health, &WalletConfig::default());
        (dir, store, bridge)
    }

    #[test]
    fn test_request_tags() {
        let value = serde_json::to_value(Request::GetWalletStatus).unwrap();
        assert_eq!(value, json!({"type": "GET_WALLET_STATUS"}));
        let parsed = Request::from_message(json!({"type": "SIMULATOR_HEALTH_CHECK"})).unwrap();
        assert_eq!(parsed, Request::SimulatorHealthCheck);
    }

    #[test]
    fn test_unknown_and_malformed_messages() {
        let err = Request::from_message(json!({"type": "EXPORT_PRIVATE_KEY"})).unwrap_err();
        assert!(matches!(err, WalletError::Unsupported(ref k) if k == "EXPORT_PRIVATE_KEY"));
        let err = Request::from_message(json!({"nope": 1})).unwrap_err();
        assert!(matches!(err, WalletError::Unsupported(_)));
        let err = Request::from_message(json!({"type": "SIGN_TRANSACTION"})).unwrap_err();
        assert!(matches!(err, WalletError::Bridge(_)));
    }

    #[tokio::test]
    async fn test_wallet_status_hides_secret() {
        let (_dir, store, bridge) = bridge();
        let response = bridge.handle(Request::GetWalletStatus).await;
        assert_eq!(response, Response::WalletStatus(WalletStatus { has_wallet: false, wallet: None }));

        let record = store.create().unwrap();
        let value = serde_json::to_value(bridge.handle(Request::GetWalletStatus).await).unwrap();
        assert_eq!(value["hasWallet"], true);
        assert_eq!(value["wallet"]["address"], record.address.as_str());
        assert!(!value.to_string().contains(&record.secret.to_hex()));
    }

    #[tokio::test]
    async fn test_health_check_downgrades_on_failure() {
        let (_dir, _store, bridge) = bridge();
        match bridge.handle(Request::NodeHealthCheck).await {
            Response::Health(status) => {
                assert!(!status.connected);
                assert!(status.error.is_some());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_message_gets_error_reply() {
        let (_dir, _store, bridge) = bridge();
        let response = bridge.handle_message(json!({"type": "DRAIN_WALLET"})).await;
        let value = serde_json::to_value(response).unwrap();
        assert!(value["error"].as_str().unwrap().contains("unsupported request"));
    }

    #[tokio::test]
    async fn test_denied_signature() {
        let (_dir, store, bridge) = bridge();
        let address = store.create().unwrap().address;
        let bridge = bridge.with_approver(Arc::new(DenyAll));
        let request = Request::SignTransaction { transaction: UnsignedTransaction::new(address, "bb", 1.0) };
        match bridge.handle(request).await {
            Response::Signature(result) => {
                assert!(!result.success);
                assert!(result.signature.is_none());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relayed_signature_needs_valid_amount() {
        let (_dir, store, bridge) = bridge();
        let address = store.create().unwrap().address;
        let request = Request::SignTransaction { transaction: UnsignedTransaction::new(address, "bb", -2.0) };
        match bridge.handle(request).await {
            Response::Signature(result) => {
                assert!(!result.success);
                assert!(result.error.unwrap().contains("invalid amount"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawned_bridge_round_trip_and_shutdown() {
        let (_dir, store, bridge) = bridge();
        let address = store.create().unwrap().address;
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, task) = bridge.spawn(shutdown_tx.subscribe());

        let tx = UnsignedTransaction::new(address, "bb", 3.0);
        let response = handle.request(Request::SignTransaction { transaction: tx.clone() }).await.unwrap();
        let Response::Signature(result) = response else { panic!("expected signature") };
        assert!(result.success);
        assert_eq!(result.signature.unwrap(), SigningService::new(store).sign(&tx).unwrap());

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(handle.request(Request::GetWalletStatus).await.is_err());
    }
}
