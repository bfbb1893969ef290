//! Data models for convind
//!
//! `Content` and `Revision` are handles onto the on-disk store. A content has
//! a fixed MIME type and an unordered set of immutable revisions. Revision IDs
//! are random; only the creation time orders revisions.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::identity::Identity;
use crate::page;
use crate::storage::{StorageError, StorageResult, StoreLayout};

/// MIME type reported for content stored without a metadata file
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One piece of content in the store
#[derive(Debug, Clone)]
pub struct Content {
    id: Identity,
    mime_type: String,
    layout: StoreLayout,
}

impl Content {
    pub(crate) fn new(id: Identity, mime_type: impl Into<String>, layout: StoreLayout) -> Self {
        Self {
            id,
            mime_type: mime_type.into().trim().to_string(),
            layout,
        }
    }

    pub fn id(&self) -> Identity {
        self.id
    }

    /// MIME type fixed when the content was created
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// All revisions currently on disk, in no particular order
    pub fn revisions(&self) -> StorageResult<Vec<Revision>> {
        let dir = self.layout.content_dir(&self.id);
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound { id: self.id },
            _ => StorageError::from_read(e, dir.clone()),
        })?;

        let mut revisions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_read(e, dir.clone()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let revision_id: u64 = name.parse().map_err(|_| StorageError::InvalidRevisionName {
                path: dir.clone(),
                name: name.clone(),
            })?;
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| StorageError::from_read(e, entry.path()))?;

            revisions.push(Revision {
                content_id: self.id,
                mime_type: self.mime_type.clone(),
                revision_id,
                creation_time: modified.into(),
                path: entry.path(),
            });
        }

        Ok(revisions)
    }

    /// Revision with the given ID
    pub fn revision(&self, revision_id: u64) -> StorageResult<Revision> {
        self.revisions()?
            .into_iter()
            .find(|r| r.revision_id == revision_id)
            .ok_or(StorageError::RevisionNotFound {
                id: self.id,
                revision_id,
            })
    }

    /// Revision with the greatest creation time, or `None` without revisions
    pub fn latest_revision(&self) -> StorageResult<Option<Revision>> {
        let revisions = self.revisions()?;
        Ok(latest(&revisions).cloned())
    }

    /// Pick the revision named by a user-supplied query value
    ///
    /// A missing, unparsable or unknown revision ID falls back to the latest
    /// revision. Only store failures are errors.
    pub fn resolve_revision(&self, requested: Option<&str>) -> StorageResult<Option<Revision>> {
        let revisions = self.revisions()?;

        if let Some(revision_id) = requested.and_then(|raw| raw.trim().parse::<u64>().ok()) {
            if let Some(found) = revisions.iter().find(|r| r.revision_id == revision_id) {
                return Ok(Some(found.clone()));
            }
            warn!(
                "Revision {} not found for {}, using latest",
                revision_id, self.id
            );
        }

        Ok(latest(&revisions).cloned())
    }

    /// Serializable description of this content and its revisions
    pub fn summary(&self) -> StorageResult<ContentSummary> {
        let mut revisions: Vec<RevisionSummary> =
            self.revisions()?.iter().map(RevisionSummary::from).collect();
        revisions.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));

        Ok(ContentSummary {
            id: self.id,
            mime_type: self.mime_type.clone(),
            title: self.latest_title()?,
            revisions,
        })
    }

    /// Page title of the latest revision
    ///
    /// `None` for non-markdown content and for pages without revisions.
    pub fn latest_title(&self) -> StorageResult<Option<String>> {
        if !page::is_markdown(&self.mime_type) {
            return Ok(None);
        }
        match self.latest_revision()? {
            Some(revision) => Ok(Some(page::title(&revision)?)),
            None => Ok(None),
        }
    }
}

/// One immutable version of a content's bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    content_id: Identity,
    mime_type: String,
    revision_id: u64,
    creation_time: DateTime<Utc>,
    path: PathBuf,
}

impl Revision {
    pub(crate) fn new(
        content_id: Identity,
        mime_type: impl Into<String>,
        revision_id: u64,
        creation_time: DateTime<Utc>,
        path: PathBuf,
    ) -> Self {
        Self {
            content_id,
            mime_type: mime_type.into(),
            revision_id,
            creation_time,
            path,
        }
    }

    /// Identity of the owning content
    pub fn content_id(&self) -> Identity {
        self.content_id
    }

    /// MIME type of the owning content
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Random revision number; carries no ordering
    pub fn revision_id(&self) -> u64 {
        self.revision_id
    }

    /// Time the revision was persisted
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Location of the revision's bytes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a read stream of the revision's bytes
    pub fn open(&self) -> StorageResult<File> {
        File::open(&self.path).map_err(|e| StorageError::from_read(e, self.path.clone()))
    }

    /// Read the whole revision into memory
    pub fn read_to_vec(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?
            .read_to_end(&mut buf)
            .map_err(|e| StorageError::from_read(e, self.path.clone()))?;
        Ok(buf)
    }

    /// Read the whole revision as text, replacing invalid UTF-8
    pub fn read_to_string(&self) -> StorageResult<String> {
        Ok(String::from_utf8_lossy(&self.read_to_vec()?).into_owned())
    }
}

/// Revision with the maximum creation time
///
/// Ties keep the first one encountered.
pub fn latest(revisions: &[Revision]) -> Option<&Revision> {
    let mut best: Option<&Revision> = None;
    for revision in revisions {
        match best {
            Some(current) if revision.creation_time <= current.creation_time => {}
            _ => best = Some(revision),
        }
    }
    best
}

/// Serializable view of a content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentSummary {
    pub id: Identity,
    pub mime_type: String,
    /// Title of the latest revision, for pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Newest first
    pub revisions: Vec<RevisionSummary>,
}

/// Serializable view of a revision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevisionSummary {
    pub revision_id: u64,
    pub creation_time: DateTime<Utc>,
}

impl From<&Revision> for RevisionSummary {
    fn from(revision: &Revision) -> Self {
        Self {
            revision_id: revision.revision_id,
            creation_time: revision.creation_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn revision(revision_id: u64, seconds: i64) -> Revision {
        Revision::new(
            Identity { epoch: 1, random: 1 },
            "text/markdown",
            revision_id,
            Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
            PathBuf::from(revision_id.to_string()),
        )
    }

    #[test]
    fn test_latest_uses_creation_time_not_revision_id() {
        let older = revision(u64::MAX, 0);
        let newer = revision(3, 10);

        let revisions = vec![older.clone(), newer.clone()];
        assert_eq!(latest(&revisions), Some(&newer));

        let reversed = vec![newer.clone(), older];
        assert_eq!(latest(&reversed), Some(&newer));
    }

    #[test]
    fn test_latest_of_nothing() {
        assert!(latest(&[]).is_none());
    }

    #[test]
    fn test_latest_tie_keeps_first() {
        let a = revision(1, 5);
        let b = revision(2, 5);
        let revisions = vec![a.clone(), b];
        assert_eq!(latest(&revisions).unwrap().revision_id(), a.revision_id());
    }

    #[test]
    fn test_summary_serialization() {
        let summary = ContentSummary {
            id: Identity { epoch: 3, random: 4 },
            mime_type: "text/plain".to_string(),
            title: None,
            revisions: vec![RevisionSummary {
                revision_id: 99,
                creation_time: Utc::now() - Duration::seconds(1),
            }],
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(&summary.id.to_string()));
        assert!(json.contains("\"revision_id\":99"));

        let parsed: ContentSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
