//! Persistent key-value store with an in-memory mirror.
//!
//! Reads are synchronous and served from the mirror. Writes update the
//! mirror immediately and are applied to the [`DurableMedium`] by a single
//! writer task in submission order. [`PersistentStore::open`] awaits
//! hydration, so a store handed out never observes a half-loaded state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

/// Key holding the session state.
pub const SESSION_KEY: &str = "schema_relay.session";

/// Key holding the event queue.
pub const EVENTS_KEY: &str = "schema_relay.events";

/// Errors from durable media.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("medium unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for sr_common::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => sr_common::Error::Io(e),
            other => sr_common::Error::Storage(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable backing for a [`PersistentStore`].
#[async_trait]
pub trait DurableMedium: Send + Sync {
    /// Load every stored value. Undecodable values are skipped.
    async fn load_all(&self) -> StorageResult<HashMap<String, Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &Value) -> StorageResult<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

// ----------------------------------------------------------------------------
// In-memory medium
// ----------------------------------------------------------------------------

/// Ephemeral medium; clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    data: Arc<RwLock<HashMap<String, Value>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put`/`delete` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current raw contents.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.data.read().await.clone()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableMedium for MemoryMedium {
    async fn load_all(&self) -> StorageResult<HashMap<String, Value>> {
        Ok(self.data.read().await.clone())
    }

    async fn put(&self, key: &str, value: &Value) -> StorageResult<()> {
        self.check_writable()?;
        self.data.write().await.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.data.write().await.remove(key);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File medium
// ----------------------------------------------------------------------------

/// One JSON document per key in a directory.
///
/// Writes go to `<key>.json.tmp` and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileMedium { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl DurableMedium for FileMedium {
    async fn load_all(&self) -> StorageResult<HashMap<String, Value>> {
        let mut out = HashMap::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "stopping directory scan early");
                    break;
                }
            };
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(key) = name.strip_suffix(".json") else {
                continue;
            };
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(key, path = %path.display(), error = %e, "skipping unreadable stored value");
                    continue;
                }
            };
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    out.insert(key.to_string(), value);
                }
                Err(e) => {
                    warn!(key, path = %path.display(), error = %e, "skipping undecodable stored value");
                }
            }
        }
        Ok(out)
    }

    async fn put(&self, key: &str, value: &Value) -> StorageResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let temp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(value)?;
        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ----------------------------------------------------------------------------
// Store
// ----------------------------------------------------------------------------

enum WriteOp {
    Put(String, Value),
    Delete(String),
    Barrier(oneshot::Sender<()>),
}

struct StoreInner {
    mirror: Mutex<HashMap<String, Value>>,
    writes: mpsc::UnboundedSender<WriteOp>,
}

/// Synchronous key-value view over a durable medium.
///
/// Cheap to clone; clones share the mirror and the writer task.
#[derive(Clone)]
pub struct PersistentStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("keys", &self.mirror().len())
            .finish()
    }
}

impl PersistentStore {
    /// Hydrate from `medium` and start the writer task.
    ///
    /// A medium that fails to load yields an empty store; the failure is
    /// logged.
    pub async fn open(medium: Arc<dyn DurableMedium>) -> Self {
        let hydrated = match medium.load_all().await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "durable medium failed to load; starting empty");
                HashMap::new()
            }
        };
        debug!(keys = hydrated.len(), "persistent store hydrated");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(medium, rx));

        PersistentStore {
            inner: Arc::new(StoreInner {
                mirror: Mutex::new(hydrated),
                writes: tx,
            }),
        }
    }

    /// Store backed by a fresh [`MemoryMedium`].
    pub async fn in_memory() -> Self {
        Self::open(Arc::new(MemoryMedium::new())).await
    }

    fn mirror(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.inner.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode the value under `key`. Absent or undecodable values read as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.mirror().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "stored value is corrupted; treating as absent");
                None
            }
        }
    }

    /// Store `value` under `key`.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "value could not be serialized; not stored");
                return;
            }
        };
        self.mirror().insert(key.to_string(), value.clone());
        self.submit(WriteOp::Put(key.to_string(), value));
    }

    pub fn remove(&self, key: &str) {
        self.mirror().remove(key);
        self.submit(WriteOp::Delete(key.to_string()));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.mirror().contains_key(key)
    }

    /// Wait until every write submitted so far has reached the medium.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.submit(WriteOp::Barrier(tx));
        let _ = rx.await;
    }

    fn submit(&self, op: WriteOp) {
        if self.inner.writes.send(op).is_err() {
            warn!("persistent store writer has stopped; write kept in memory only");
        }
    }
}

async fn run_writer(medium: Arc<dyn DurableMedium>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Put(key, value) => {
                if let Err(e) = medium.put(&key, &value).await {
                    warn!(key, error = %e, "durable write failed");
                }
            }
            WriteOp::Delete(key) => {
                if let Err(e) = medium.delete(&key).await {
                    warn!(key, error = %e, "durable delete failed");
                }
            }
            WriteOp::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("persistent store writer stopped");
}
