//! Blob storage backends.
//!
//! `BlobStore` is the seam between the sharding logic and the bytes on a
//! node: an in-memory map for tests and small deployments, a directory of
//! digest-named files for real ones. Blobs are immutable once written, so
//! a second create under the same name is reported rather than overwritten.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::ChordError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`. `AlreadyStored` when the name exists.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), ChordError>;

    /// Fetch a blob; `None` when this store holds no copy.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, ChordError>;

    async fn contains(&self, name: &str) -> bool;
}

/// DashMap-backed store; the default for tests.
#[derive(Default)]
pub struct MemoryStore {
    blobs: DashMap<String, Arc<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), ChordError> {
        match self.blobs.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ChordError::AlreadyStored(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(bytes.to_vec()));
                Ok(())
            }
        }
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, ChordError> {
        Ok(self.blobs.get(name).map(|blob| blob.as_ref().clone()))
    }

    async fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }
}

/// One digest-named file per blob under a flat directory.
///
/// Writes go through a temp file followed by a rename so a crashed write
/// never leaves a half-blob under its final name.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ChordError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ChordError::Storage(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl BlobStore for DiskStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), ChordError> {
        let path = self.path(name);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ChordError::Storage(format!("stat {}: {e}", path.display())))?
        {
            return Err(ChordError::AlreadyStored(name.to_string()));
        }
        let tmp = self.root.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| ChordError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ChordError::Storage(format!("rename {}: {e}", path.display())))?;
        debug!("stored {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, ChordError> {
        match tokio::fs::read(self.path(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChordError::Storage(format!("read {name}: {e}"))),
        }
    }

    async fn contains(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.path(name)).await.unwrap_or(false)
    }
}
