//! Wallet configuration - passed from the embedding surface or read from env.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NODE_URL: &str = "http://localhost:3000";
pub const DEFAULT_SIMULATOR_URL: &str = "http://localhost:3001";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FAUCET_AMOUNT: f64 = 100.0;

const APP_DIR: &str = "driftwallet";

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub node_url: String,
    pub simulator_url: String,
    pub data_dir: PathBuf,
    /// Balance + history poll period per surface.
    pub refresh_interval: Duration,
    /// Liveness probe period (bridge and each surface).
    pub health_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.into(),
            simulator_url: DEFAULT_SIMULATOR_URL.into(),
            data_dir: default_data_dir(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl WalletConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DRIFTWALLET_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = env_string("DRIFTWALLET_NODE_URL") {
            config.node_url = url;
        }
        if let Some(url) = env_string("DRIFTWALLET_SIMULATOR_URL") {
            config.simulator_url = url;
        }
        if let Some(dir) = env_string("DRIFTWALLET_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_secs("DRIFTWALLET_REFRESH_SECS") {
            config.refresh_interval = secs;
        }
        if let Some(secs) = env_secs("DRIFTWALLET_HEALTH_SECS") {
            config.health_interval = secs;
        }
        if let Some(secs) = env_secs("DRIFTWALLET_TIMEOUT_SECS") {
            config.request_timeout = secs;
        }
        config
    }

    pub fn with_node_url(mut self, url: impl Into<String>) -> Self { self.node_url = url.into(); self }
    pub fn with_simulator_url(mut self, url: impl Into<String>) -> Self { self.simulator_url = url.into(); self }
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.data_dir = dir.into(); self }
    pub fn with_refresh_interval(mut self, every: Duration) -> Self { self.refresh_interval = nonzero(every); self }
    pub fn with_health_interval(mut self, every: Duration) -> Self { self.health_interval = nonzero(every); self }
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self { self.request_timeout = timeout; self }
}

/// `$DRIFTWALLET_ROOT/driftwallet`, else the platform data dir.
pub fn default_data_dir() -> PathBuf {
    let root = std::env::var("DRIFTWALLET_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
    root.join(APP_DIR)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_string(key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

// tokio intervals panic on a zero period
fn nonzero(every: Duration) -> Duration {
    every.max(Duration::from_millis(1))
}
