//! Health probes against the two liveness endpoints.
//!
//! Connectivity failures never propagate: a failed probe is logged and turns
//! into `connected: false`. The latest snapshot is kept in memory and cached in
//! the wallet store for surfaces that start later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::ledger::{Ledger, Service};
use crate::store::WalletStore;
use crate::sync::InFlight;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "checkedAt")]
    pub checked_at: DateTime<Utc>,
}

impl ServiceHealth {
    pub fn connected(status: u16) -> Self {
        Self { connected: true, status: Some(status), error: None, checked_at: Utc::now() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { connected: false, status: None, error: Some(error.into()), checked_at: Utc::now() }
    }

    pub fn unknown() -> Self {
        Self { connected: false, status: None, error: None, checked_at: Utc::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub node: ServiceHealth,
    pub simulator: ServiceHealth,
}

impl HealthSnapshot {
    pub fn unknown() -> Self {
        Self { node: ServiceHealth::unknown(), simulator: ServiceHealth::unknown() }
    }
}

pub struct HealthMonitor {
    ledger: Arc<dyn Ledger>,
    store: Option<Arc<WalletStore>>,
    latest: RwLock<HealthSnapshot>,
    in_flight: InFlight,
}

impl HealthMonitor {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            store: None,
            latest: RwLock::new(HealthSnapshot::unknown()),
            in_flight: InFlight::default(),
        }
    }

    /// Persist every full probe round into the store's health cache.
    pub fn with_store(mut self, store: Arc<WalletStore>) -> Self {
        if let Ok(Some(cached)) = store.health() {
            self.latest = RwLock::new(cached);
        }
        self.store = Some(store);
        self
    }

    pub fn latest(&self) -> HealthSnapshot {
        self.latest.read().map(|s| s.clone()).unwrap_or_else(|_| HealthSnapshot::unknown())
    }

    /// Probe one service and fold the result into the in-memory snapshot.
    pub async fn probe(&self, service: Service) -> ServiceHealth {
        let health = match self.ledger.health(service).await {
            Ok(reply) if reply.ok => ServiceHealth::connected(reply.status),
            Ok(reply) => {
                warn!(service = service.as_str(), status = reply.status, "health probe unhealthy");
                ServiceHealth {
                    connected: false,
                    status: Some(reply.status),
                    error: reply.message,
                    checked_at: Utc::now(),
                }
            }
            Err(e) => {
                warn!(service = service.as_str(), error = %e, "health probe failed");
                ServiceHealth::failed(e.to_string())
            }
        };
        if let Ok(mut latest) = self.latest.write() {
            match service {
                Service::Node => latest.node = health.clone(),
                Service::Simulator => latest.simulator = health.clone(),
            }
        }
        health
    }

    /// Probe both services. If a round is already in flight the cached
    /// snapshot is returned instead of issuing overlapping requests.
    pub async fn probe_all(&self) -> HealthSnapshot {
        let Some(_guard) = self.in_flight.try_begin() else {
            debug!("health round already in flight");
            return self.latest();
        };
        let (node, simulator) = tokio::join!(self.probe(Service::Node), self.probe(Service::Simulator));
        let snapshot = HealthSnapshot { node, simulator };
        if let Some(store) = &self.store {
            let cached = snapshot.clone();
            if let Err(e) = store.run_blocking(move |s| s.record_health(&cached)).await {
                warn!(error = %e, "failed to cache health snapshot");
            }
        }
        snapshot
    }
}
