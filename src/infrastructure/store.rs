// Best-effort key-value persistence, the localStorage analogue
//
// One JSON document per key under a data directory. Reads tolerate missing
// or corrupt data, writes never propagate errors; both report through
// `StoreStatus` so callers and tests can observe degraded mode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Outcome of a best-effort write. Failures are logged at the gateway, the
/// caller keeps its in-memory state either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Persisted,
    Failed,
}

impl StoreStatus {
    pub fn is_persisted(self) -> bool {
        self == StoreStatus::Persisted
    }
}

/// Synchronous key-value store. Object-safe so tests can substitute a
/// failing or in-memory implementation.
pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, value: &str) -> StoreStatus;
    fn remove(&self, key: &str) -> StoreStatus;
}

/// Store keys shared with the legacy dashboard's persisted blobs.
pub mod keys {
    pub const THRESHOLDS: &str = "custom_thresholds";
    pub const DARK_MODE: &str = "dark_mode";
    pub const LANGUAGE: &str = "language";
    pub const DASHBOARD_CONFIG: &str = "dashboard-config";
    pub const ALERT_HISTORY: &str = "opcua-alert-history";
}

/// Typed read. Corrupt or missing data yields `None`, never an error.
pub fn get_value<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("discarding corrupt stored value for key {key}: {e}");
            None
        }
    }
}

/// Typed write-through. Serialization failures count as a failed write.
pub fn set_value<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> StoreStatus {
    match serde_json::to_string(value) {
        Ok(raw) => store.set_raw(key, &raw),
        Err(e) => {
            tracing::error!("failed to serialize value for key {key}: {e}");
            StoreStatus::Failed
        }
    }
}

/// File-backed store, one `<key>.json` per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::error!("could not create data directory {}: {e}", dir.display());
        }
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("error reading key {key}: {e}");
                None
            }
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreStatus {
        match fs::write(self.path_for(key), value) {
            Ok(()) => StoreStatus::Persisted,
            Err(e) => {
                tracing::error!("error writing key {key}: {e}");
                StoreStatus::Failed
            }
        }
    }

    fn remove(&self, key: &str) -> StoreStatus {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => StoreStatus::Persisted,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreStatus::Persisted,
            Err(e) => {
                tracing::error!("error removing key {key}: {e}");
                StoreStatus::Failed
            }
        }
    }
}
