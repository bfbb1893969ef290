//! Content store
//!
//! The `Store` persists immutable content under an `Identity`. Each content
//! owns an append-only, unordered set of revisions. There is no update in
//! place: new bytes always become a new revision.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open(&config)?;
//!
//! let content = store.create("text/markdown")?;
//! store.append_revision(&content, "# Hello".as_bytes())?;
//!
//! let latest = store.get(&content.id())?.latest_revision()?;
//! ```
//!
//! The store holds no in-process state beyond its root path, so it can be
//! shared freely between threads. Concurrent appends to the same content
//! each land in their own file keyed by a fresh random revision ID.

use std::fs;
use std::io::{self, Read};

use tracing::{debug, warn};

use crate::config::Config;
use crate::identity::{random_u64, Identity};
use crate::models::{Content, Revision, DEFAULT_MIME_TYPE};
use crate::storage::persistence::{ensure_dir, staging_path};
use crate::storage::{
    atomic_copy, atomic_write, StorageError, StorageResult, StoreLayout, MIME_TYPE_FILE,
};

/// Filesystem-backed content store
#[derive(Debug, Clone)]
pub struct Store {
    layout: StoreLayout,
}

impl Store {
    /// Open the store rooted at the configured data directory
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_at(config.data_dir.clone())
    }

    /// Open the store rooted at `root`, creating the directory if needed
    pub fn open_at(root: impl Into<std::path::PathBuf>) -> StorageResult<Self> {
        let layout = StoreLayout::new(root);
        ensure_dir(layout.root())?;
        Ok(Self { layout })
    }

    /// Directory layout of this store
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Create a new content with a fresh identity and no revisions
    ///
    /// The content directory is assembled under a hidden staging name and
    /// renamed into place, so it never appears without its MIME type.
    pub fn create(&self, mime_type: &str) -> StorageResult<Content> {
        let id = Identity::generate();
        let dir = self.layout.content_dir(&id);
        let staged = staging_path(&dir);

        fs::create_dir(&staged).map_err(|source| StorageError::CreateDirectory {
            path: staged.clone(),
            source,
        })?;

        let published =
            atomic_write(&staged.join(MIME_TYPE_FILE), mime_type.as_bytes()).and_then(|_| {
                fs::rename(&staged, &dir).map_err(|source| StorageError::AtomicWriteFailed {
                    from: staged.clone(),
                    to: dir.clone(),
                    source,
                })
            });
        if let Err(err) = published {
            let _ = fs::remove_dir_all(&staged);
            return Err(err);
        }

        debug!("Created content {} ({})", id, mime_type);
        Ok(Content::new(id, mime_type, self.layout.clone()))
    }

    /// Look up a content by identity
    pub fn get(&self, id: &Identity) -> StorageResult<Content> {
        let dir = self.layout.content_dir(id);
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StorageError::NotFound { id: *id }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound { id: *id })
            }
            Err(e) => return Err(StorageError::from_read(e, dir)),
        }

        let mime_path = self.layout.mime_type_path(id);
        let mime_type = match fs::read_to_string(&mime_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => DEFAULT_MIME_TYPE.to_string(),
            Err(e) => return Err(StorageError::from_read(e, mime_path)),
        };

        Ok(Content::new(*id, mime_type, self.layout.clone()))
    }

    /// Identities of every content in the store, in no particular order
    ///
    /// Hidden entries (staged writes) are skipped, as are entries whose names
    /// are not identities.
    pub fn list_all(&self) -> StorageResult<Vec<Identity>> {
        let root = self.layout.root();
        let entries =
            fs::read_dir(root).map_err(|e| StorageError::from_read(e, root.to_path_buf()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_read(e, root.to_path_buf()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            match Identity::decode(&name) {
                Ok(id) => ids.push(id),
                Err(e) => warn!("Skipping {:?} in store root: {}", name, e),
            }
        }

        Ok(ids)
    }

    /// Persist a new immutable revision of `content`
    ///
    /// The revision gets a fresh random ID and is stamped with the time it
    /// became visible.
    pub fn append_revision<R: Read>(
        &self,
        content: &Content,
        mut reader: R,
    ) -> StorageResult<Revision> {
        let id = content.id();
        if !self.layout.content_dir(&id).is_dir() {
            return Err(StorageError::NotFound { id });
        }

        let revision_id = random_u64();
        let path = self.layout.revision_path(&id, revision_id);
        let stamp = atomic_copy(&path, &mut reader)?;

        debug!("Appended revision {} to {}", revision_id, id);
        Ok(Revision::new(
            id,
            content.mime_type(),
            revision_id,
            stamp.into(),
            path,
        ))
    }

    /// Remove a content and all of its revisions
    pub fn delete(&self, id: &Identity) -> StorageResult<()> {
        let dir = self.layout.content_dir(id);
        fs::remove_dir_all(&dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound { id: *id },
            _ => StorageError::from_io(e, dir.clone()),
        })?;
        debug!("Deleted content {}", id);
        Ok(())
    }
}
