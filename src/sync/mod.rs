//! SyncScheduler - Per-surface polling of balance, history and liveness.
//!
//! ```text
//! SyncScheduler::start()
//!     │
//!     ├── refresh tick (10s) ─┐
//!     ├── refresh_now() ──────┼──→ wallet refresh ──→ store (CAS balance)
//!     │                       │                   └─→ SurfaceState
//!     └── health tick (30s) ──────→ HealthMonitor::probe_all ──→ SurfaceState
//!
//! stop() / Shutdown / dropping the SyncHandle ends the loop
//! ```
//!
//! Each polled resource has one in-flight guard: a tick that fires while the
//! previous round trip is still running is skipped rather than stacked. An
//! explicit `refresh_now()` during a running refresh schedules one rerun.
//! Rendering code watches [`SurfaceState`] through a `tokio::sync::watch`.

mod guard;

pub use guard::{InFlight, InFlightGuard};

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::ledger::Ledger;
use crate::store::{StoreError, WalletStore};
use crate::types::HistoryEntry;

/// What a surface renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceState {
    pub address: Option<String>,
    pub balance: Option<f64>,
    pub transactions: Vec<HistoryEntry>,
    pub node_connected: bool,
    pub simulator_connected: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl SurfaceState {
    fn apply_health(&mut self, snapshot: &HealthSnapshot) {
        self.node_connected = snapshot.node.connected;
        self.simulator_connected = snapshot.simulator.connected;
        self.last_health_check = Some(snapshot.node.checked_at.max(snapshot.simulator.checked_at));
    }
}

/// Cloneable "refresh now" button for other components of the same surface.
#[derive(Clone, Default)]
pub struct RefreshTrigger(Arc<Notify>);

impl RefreshTrigger {
    pub fn refresh_now(&self) {
        self.0.notify_one();
    }
}

pub struct SyncScheduler {
    store: Arc<WalletStore>,
    ledger: Arc<dyn Ledger>,
    health: Arc<HealthMonitor>,
    refresh_interval: Duration,
    health_interval: Duration,
}

impl SyncScheduler {
    pub fn new(
        store: Arc<WalletStore>,
        ledger: Arc<dyn Ledger>,
        health: Arc<HealthMonitor>,
        config: &WalletConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            health,
            refresh_interval: config.refresh_interval,
            health_interval: config.health_interval,
        }
    }

    /// Spawn the polling loop. Both timers fire immediately, then on period.
    pub fn start(self, mut shutdown: broadcast::Receiver<()>) -> SyncHandle {
        let (state_tx, state_rx) = watch::channel(self.initial_state());
        let trigger = RefreshTrigger::default();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (refresh_every, health_every) = (self.refresh_interval, self.health_interval);

        let worker = Arc::new(Worker {
            store: self.store,
            ledger: self.ledger,
            health: self.health,
            state: state_tx,
            wallet_flight: InFlight::default(),
            rerun: AtomicBool::new(false),
        });
        let notify = trigger.0.clone();

        let task = tokio::spawn(async move {
            let mut refresh = tokio::time::interval(refresh_every);
            let mut health = tokio::time::interval(health_every);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
            health.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(refresh_ms = refresh_every.as_millis() as u64, health_ms = health_every.as_millis() as u64, "sync scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = &mut stop_rx => break,
                    _ = refresh.tick() => Worker::spawn_wallet_refresh(&worker, false),
                    _ = notify.notified() => Worker::spawn_wallet_refresh(&worker, true),
                    _ = health.tick() => Worker::spawn_health_refresh(&worker),
                }
            }
            info!("sync scheduler stopped");
        });

        SyncHandle { state: state_rx, trigger, stop: stop_tx, task }
    }

    // The surface's own startup snapshot: cached balance and health.
    fn initial_state(&self) -> SurfaceState {
        let mut state = SurfaceState::default();
        match self.store.load() {
            Ok(Some(wallet)) => {
                state.address = Some(wallet.address);
                state.balance = Some(wallet.balance);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read wallet at startup"),
        }
        if let Ok(Some(cached)) = self.store.health() {
            state.apply_health(&cached);
        }
        state
    }
}

struct Worker {
    store: Arc<WalletStore>,
    ledger: Arc<dyn Ledger>,
    health: Arc<HealthMonitor>,
    state: watch::Sender<SurfaceState>,
    wallet_flight: InFlight,
    rerun: AtomicBool,
}

impl Worker {
    fn spawn_wallet_refresh(worker: &Arc<Self>, requested: bool) {
        let Some(guard) = worker.wallet_flight.try_begin() else {
            if requested {
                worker.rerun.store(true, Ordering::Release);
            }
            debug!("wallet refresh still in flight, skipping");
            return;
        };
        let worker = worker.clone();
        tokio::spawn(async move {
            let _guard = guard;
            loop {
                worker.refresh_wallet().await;
                if !worker.rerun.swap(false, Ordering::AcqRel) {
                    break;
                }
            }
        });
    }

    fn spawn_health_refresh(worker: &Arc<Self>) {
        let worker = worker.clone();
        tokio::spawn(async move {
            let snapshot = worker.health.probe_all().await;
            worker.state.send_modify(|s| s.apply_health(&snapshot));
        });
    }

    async fn refresh_wallet(&self) {
        let snapshot = match self.store.run_blocking(|s| s.snapshot()).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("no wallet yet, nothing to refresh");
                return;
            }
            Err(e) => {
                warn!(error = %e, "wallet read failed");
                return;
            }
        };
        let address = snapshot.value.address.clone();
        let (balance, history) = tokio::join!(
            self.ledger.balance(&address),
            self.ledger.transactions(&address)
        );

        let balance = match balance {
            Ok(remote) => match self
                .store
                .run_blocking(move |s| s.compare_and_set_balance(snapshot.version, remote))
                .await
            {
                Ok(_) => Some(remote),
                Err(StoreError::VersionConflict { .. }) => {
                    debug!("a newer write landed during refresh, keeping it");
                    self.store.run_blocking(|s| s.load()).await.ok().flatten().map(|w| w.balance)
                }
                Err(e) => {
                    warn!(error = %e, "could not persist balance");
                    Some(remote)
                }
            },
            Err(e) => {
                warn!(%address, error = %e, "balance refresh failed");
                None
            }
        };
        let history = match history {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(%address, error = %e, "history refresh failed");
                None
            }
        };

        let reachable = balance.is_some() && history.is_some();
        self.state.send_modify(|s| {
            s.address = Some(address);
            // Only the health probe marks the node connected.
            if !reachable {
                s.node_connected = false;
            }
            if let Some(balance) = balance {
                s.balance = Some(balance);
            }
            if let Some(entries) = history {
                s.transactions = entries;
            }
            s.last_refresh = Some(Utc::now());
        });
    }
}

/// Owner of a running scheduler. Dropping it stops the loop as well.
pub struct SyncHandle {
    state: watch::Receiver<SurfaceState>,
    trigger: RefreshTrigger,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn state(&self) -> SurfaceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SurfaceState> {
        self.state.clone()
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    pub fn refresh_now(&self) {
        self.trigger.refresh_now();
    }

    /// Stop the timers and wait for the loop to exit. Refreshes already in
    /// flight are allowed to finish.
    pub async fn stop(self) {
        let SyncHandle { stop, task, .. } = self;
        let _ = stop.send(());
        let _ = task.await;
    }
}
