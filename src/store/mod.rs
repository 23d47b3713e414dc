//! WalletStateStore - the one owner of the persisted wallet record.
//!
//! Every surface reads through the same `Arc<WalletStore>` and gets an owned
//! snapshot back. Writes go through the store only. Each wallet mutation bumps
//! a monotonic `version`, and [`WalletStore::compare_and_set_balance`] lets a
//! poller refuse to overwrite a newer write with a stale result.
//!
//! Every read-modify-write holds an exclusive `fs2` lock on `wallet.lock`, so
//! separate handles on one directory (CLI commands, other processes) never
//! interleave. On disk this is a single `wallet.json`, replaced atomically on
//! every write:
//!
//! ```json
//! { "version": 3, "wallet": { "address": "...", ... }, "health": { ... } }
//! ```

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::health::HealthSnapshot;
use crate::types::{Versioned, WalletRecord};
use crate::vault::{Secret, VaultError};

pub const WALLET_FILE: &str = "wallet.json";
pub const LOCK_FILE: &str = "wallet.lock";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(String),

    #[error("store json: {0}")]
    Json(String),

    #[error("no wallet")]
    NoWallet,

    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("store lock: {0}")]
    Lock(String),

    #[error("store task: {0}")]
    Task(String),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    wallet: Option<WalletRecord>,
    #[serde(default)]
    health: Option<HealthSnapshot>,
}

pub struct WalletStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive hold on `wallet.lock`, released on drop.
struct WriteLock(File);

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl WalletStore {
    /// Open (or prepare) the store under `dir`. Nothing is written until the
    /// first mutation.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Io(format!("mkdir {}: {e}", dir.display())))?;
        Ok(Self { path: dir.join(WALLET_FILE), lock_path: dir.join(LOCK_FILE) })
    }

    /// Run `op` on a blocking thread; for callers inside async tasks.
    pub async fn run_blocking<T, F>(self: &Arc<Self>, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&WalletStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owned snapshot of the wallet, if one was created.
    pub fn load(&self) -> StoreResult<Option<WalletRecord>> {
        Ok(self.read_file()?.wallet)
    }

    pub fn snapshot(&self) -> StoreResult<Option<Versioned<WalletRecord>>> {
        let file = self.read_file()?;
        Ok(file.wallet.map(|value| Versioned { version: file.version, value }))
    }

    pub fn version(&self) -> StoreResult<u64> {
        Ok(self.read_file()?.version)
    }

    /// Create the wallet once. An existing record is returned untouched.
    pub fn create(&self) -> StoreResult<WalletRecord> {
        let _guard = self.lock()?;
        let mut file = self.read_file()?;
        if let Some(existing) = file.wallet {
            debug!(address = %existing.address, "wallet already exists");
            return Ok(existing);
        }
        let record = WalletRecord::generate()?;
        file.wallet = Some(record.clone());
        file.version += 1;
        self.write_file(&file)?;
        info!(address = %record.address, "wallet created");
        Ok(record)
    }

    /// Last-write-wins balance update. Returns the new version.
    pub fn set_balance(&self, balance: f64) -> StoreResult<u64> {
        self.update_balance(None, balance)
    }

    /// Balance update that only applies if nobody wrote since `expected`.
    pub fn compare_and_set_balance(&self, expected: u64, balance: f64) -> StoreResult<u64> {
        self.update_balance(Some(expected), balance)
    }

    fn update_balance(&self, expected: Option<u64>, balance: f64) -> StoreResult<u64> {
        let _guard = self.lock()?;
        let mut file = self.read_file()?;
        if let Some(expected) = expected {
            if file.version != expected {
                return Err(StoreError::VersionConflict { expected, actual: file.version });
            }
        }
        let wallet = file.wallet.as_mut().ok_or(StoreError::NoWallet)?;
        if wallet.balance == balance {
            return Ok(file.version);
        }
        wallet.balance = balance;
        file.version += 1;
        self.write_file(&file)?;
        Ok(file.version)
    }

    pub(crate) fn secret(&self) -> StoreResult<Secret> {
        self.load()?.map(|w| w.secret).ok_or(StoreError::NoWallet)
    }

    /// Cache the latest health probe results. Does not bump the wallet version.
    pub fn record_health(&self, snapshot: &HealthSnapshot) -> StoreResult<()> {
        let _guard = self.lock()?;
        let mut file = self.read_file()?;
        file.health = Some(snapshot.clone());
        self.write_file(&file)
    }

    pub fn health(&self) -> StoreResult<Option<HealthSnapshot>> {
        Ok(self.read_file()?.health)
    }

    fn lock(&self) -> StoreResult<WriteLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StoreError::Lock(format!("open {}: {e}", self.lock_path.display())))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::Lock(format!("lock {}: {e}", self.lock_path.display())))?;
        Ok(WriteLock(file))
    }

    fn read_file(&self) -> StoreResult<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Io(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Json(e.to_string()))
    }

    fn write_file(&self, file: &StoreFile) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(file).map_err(|e| StoreError::Json(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|e| StoreError::Io(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Io(format!("rename {}: {e}", self.path.display())))
    }
}
