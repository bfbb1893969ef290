//! Derived artifact cache
//!
//! Artifacts live as plain files under the cache directory, one per
//! `(content identity, revision ID, command)` triple. Once an artifact file
//! exists it is served as-is for the rest of the process lifetime.
//!
//! Production is coalesced per key: concurrent requests for the same missing
//! artifact queue on a per-key async mutex, and only the first runs the
//! producer. The producer writes to a hidden staging file that is renamed
//! into place on success and removed on failure or cancellation, so the
//! artifact path only ever holds complete output.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::error::{ClassError, ClassResult};
use crate::identity::Identity;
use crate::storage::persistence::{ensure_dir, staging_path};
use crate::storage::{StorageError, StorageResult};

/// Identifies one derived artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_id: Identity,
    pub revision_id: u64,
    pub command: Vec<String>,
}

impl CacheKey {
    pub fn new(content_id: Identity, revision_id: u64, command: &[String]) -> Self {
        Self {
            content_id,
            revision_id,
            command: command.to_vec(),
        }
    }

    /// File name of the artifact
    ///
    /// The command is reduced to a fixed-width digest so the name stays
    /// within filesystem limits however long the command is. Arguments are
    /// joined with NUL before hashing so that `["a b"]` and `["a", "b"]`
    /// never share a slot.
    pub fn file_name(&self) -> String {
        let digest = blake3::hash(self.command.join("\0").as_bytes());
        format!(
            "{}-{}-{}",
            self.content_id,
            self.revision_id,
            digest.to_hex()
        )
    }
}

type LockTable = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Directory of derived artifacts with per-key production locks
#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    locks: LockTable,
}

impl ArtifactCache {
    /// Open the cache rooted at `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the artifact for `key` lives once produced
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Artifact path if it has already been produced
    pub async fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Return the artifact for `key`, producing it first if needed
    ///
    /// `produce` receives the staging path to write to. It runs at most once
    /// per key at a time; callers that queued behind it reuse its output.
    pub async fn get_or_produce<F, Fut>(&self, key: &CacheKey, produce: F) -> ClassResult<PathBuf>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = ClassResult<()>>,
    {
        if let Some(path) = self.lookup(key).await {
            return Ok(path);
        }

        let lease = self.lease(key);
        let _guard = lease.lock.lock().await;

        // Someone else may have finished while we waited
        if let Some(path) = self.lookup(key).await {
            debug!("Artifact {} produced by another caller", key.file_name());
            return Ok(path);
        }

        let path = self.path_for(key);
        let mut staged = StagedArtifact::new(staging_path(&path));
        produce(staged.path.clone()).await?;
        staged.publish(&path).await?;

        Ok(path)
    }

    fn lease(&self, key: &CacheKey) -> KeyLease<'_> {
        let name = key.file_name();
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(table.entry(name.clone()).or_default());
        KeyLease {
            table: &self.locks,
            name,
            lock,
        }
    }

    #[cfg(test)]
    fn pending_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds a per-key lock; drops the table entry when the last holder leaves
struct KeyLease<'a> {
    table: &'a LockTable,
    name: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here
        if Arc::strong_count(&self.lock) == 2 {
            table.remove(&self.name);
        }
    }
}

/// Staging file that is deleted unless published
struct StagedArtifact {
    path: PathBuf,
    published: bool,
}

impl StagedArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            published: false,
        }
    }

    async fn publish(&mut self, target: &Path) -> ClassResult<()> {
        tokio::fs::rename(&self.path, target)
            .await
            .map_err(|source| {
                ClassError::Storage(StorageError::AtomicWriteFailed {
                    from: self.path.clone(),
                    to: target.to_path_buf(),
                    source,
                })
            })?;
        self.published = true;
        Ok(())
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.published {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
