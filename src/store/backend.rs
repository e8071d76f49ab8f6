//! Pluggable persistence for the offer store.
//!
//! The extension persists two keyed JSON blobs (database + meta) through
//! whatever storage the host environment provides. The store itself only
//! sees this trait; tests and the popup preview use [`MemoryBackend`],
//! while [`JsonFileBackend`] keeps the blobs in a single JSON file on disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// Whole-blob key/value persistence. Implementations report failures as
/// `anyhow::Error`; the store classifies them as retryable.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Value>>;
    async fn store(&self, key: &str, value: Value) -> Result<()>;
}

/// In-process backend backed by a map. Used by tests and short-lived
/// sessions that never touch disk.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for handing the backend to an [`OfferStore`].
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// File-backed storage: all keys live in one JSON object on disk, read and
/// rewritten whole on every call. Suitable for the small blobs this store
/// deals in.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<HashMap<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt storage file {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => {
                Err(err).with_context(|| format!("reading storage file {}", self.path.display()))
            }
        }
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let mut all = self.read_all().await?;
        Ok(all.remove(key))
    }

    async fn store(&self, key: &str, value: Value) -> Result<()> {
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&all)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating storage dir {}", parent.display()))?;
            }
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("writing storage file {}", self.path.display()))
    }
}
