//! Link graph over the markdown documents in the store
//!
//! The graph is a snapshot of every internal link found in the latest
//! revision of each markdown document, plus the title and MIME type of every
//! content. It is rebuilt lazily: a query first checks whether any content
//! has a revision newer than the snapshot and, if so, rebuilds it in full.
//!
//! Rebuilds are serialized. Queries read an `Arc` of the current snapshot and
//! never see a half-built one. A failed rebuild leaves the previous snapshot
//! in place.

mod extract;
mod query;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::identity::Identity;
use crate::models::Revision;
use crate::page;
use crate::storage::{StorageError, StorageResult};
use crate::store::Store;

pub use extract::{
    extract_links, internal_target, ExtractedLink, API_DATA_PREFIX, CONTEXT_CHARS,
};
pub use query::{HopEntry, Neighborhood};

/// Errors that abort a rebuild
#[derive(Error, Debug)]
pub enum BuildError {
    /// Listing or inspecting the store failed
    #[error("Failed to scan store: {0}")]
    Storage(#[from] StorageError),

    /// A document's latest revision could not be read
    #[error("Failed to read document {id}: {source}")]
    Read {
        id: Identity,
        #[source]
        source: StorageError,
    },
}

/// A directed link between two documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEdge {
    pub src: Identity,
    pub dst: Identity,
    /// Text around the link in the source document
    pub context: String,
}

/// Immutable state of the graph as of one build
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    titles: HashMap<Identity, String>,
    mime_types: HashMap<Identity, String>,
    edges: Vec<LinkEdge>,
    last_built_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn edges(&self) -> &[LinkEdge] {
        &self.edges
    }

    /// Title of a markdown document; empty when unknown
    pub fn title(&self, id: &Identity) -> &str {
        self.titles.get(id).map(String::as_str).unwrap_or_default()
    }

    /// MIME type of any content; empty when unknown
    pub fn mime_type(&self, id: &Identity) -> &str {
        self.mime_types.get(id).map(String::as_str).unwrap_or_default()
    }

    /// Newest revision time covered by this snapshot
    pub fn last_built_at(&self) -> Option<DateTime<Utc>> {
        self.last_built_at
    }

    fn build(store: &Store, stamp: Option<DateTime<Utc>>) -> Result<Self, BuildError> {
        let mut snapshot = Snapshot {
            last_built_at: stamp,
            ..Snapshot::default()
        };

        for id in store.list_all()? {
            let Some(content) = skip_vanished(store.get(&id))? else {
                continue;
            };
            snapshot
                .mime_types
                .insert(id, content.mime_type().to_string());
            if !page::is_markdown(content.mime_type()) {
                continue;
            }

            let Some(revision) = skip_vanished(content.latest_revision())?.flatten() else {
                continue;
            };
            let text = revision
                .read_to_string()
                .map_err(|source| BuildError::Read { id, source })?;
            snapshot.titles.insert(id, page::title_from_text(&text));

            for link in extract_links(&text) {
                if let Some(dst) = internal_target(&link.destination) {
                    snapshot.edges.push(LinkEdge {
                        src: id,
                        dst,
                        context: link.context,
                    });
                }
            }
        }

        Ok(snapshot)
    }
}

/// Content removed between listing and reading is skipped
fn skip_vanished<T>(result: StorageResult<T>) -> StorageResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StorageError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lazily rebuilt link graph
#[derive(Debug)]
pub struct LinkGraph {
    store: Store,
    snapshot: RwLock<Arc<Snapshot>>,
    rebuild: Mutex<()>,
    generation: AtomicU64,
}

impl LinkGraph {
    /// An empty graph over `store`; the first query builds it
    pub fn new(store: Store) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            rebuild: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of completed rebuilds
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Rebuild if any content has a revision newer than the snapshot
    ///
    /// Returns whether this call rebuilt. Callers that find a rebuild already
    /// running wait for it and then re-check, so concurrent triggers cause a
    /// single rebuild.
    pub fn refresh_if_stale(&self) -> Result<bool, BuildError> {
        if !self.is_stale(self.latest_creation_time()?) {
            return Ok(false);
        }

        let _guard = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        let observed = self.latest_creation_time()?;
        if !self.is_stale(observed) {
            return Ok(false);
        }

        self.rebuild_locked(observed)?;
        Ok(true)
    }

    /// Rebuild regardless of staleness
    pub fn force_rebuild(&self) -> Result<(), BuildError> {
        let _guard = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        let observed = self.latest_creation_time()?;
        self.rebuild_locked(observed)
    }

    /// Neighborhood of the revision's document
    ///
    /// Refreshes first. A failed refresh is logged and the previous snapshot
    /// answers instead.
    ///
    /// This blocks: it scans the store and may wait on a rebuild. Async
    /// callers serving many requests should run it under
    /// `tokio::task::spawn_blocking`.
    pub fn attempt_instance(&self, revision: &Revision) -> Neighborhood {
        if let Err(e) = self.refresh_if_stale() {
            warn!("Link graph refresh failed, serving previous snapshot: {}", e);
        }
        self.snapshot().neighborhood(&revision.content_id())
    }

    fn is_stale(&self, observed: Option<DateTime<Utc>>) -> bool {
        match (observed, self.snapshot().last_built_at) {
            (Some(observed), Some(built)) => observed > built,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Newest creation time among the latest revisions of all contents
    fn latest_creation_time(&self) -> Result<Option<DateTime<Utc>>, BuildError> {
        let mut newest = None;
        for id in self.store.list_all()? {
            let Some(content) = skip_vanished(self.store.get(&id))? else {
                continue;
            };
            if let Some(revision) = skip_vanished(content.latest_revision())?.flatten() {
                newest = newest.max(Some(revision.creation_time()));
            }
        }
        Ok(newest)
    }

    fn rebuild_locked(&self, stamp: Option<DateTime<Utc>>) -> Result<(), BuildError> {
        let snapshot = Snapshot::build(&self.store, stamp)?;
        info!(
            "Rebuilt link graph: {} documents, {} edges",
            snapshot.mime_types.len(),
            snapshot.edges.len()
        );

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
